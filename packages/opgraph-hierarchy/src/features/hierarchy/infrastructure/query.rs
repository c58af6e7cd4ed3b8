//! Read-only queries over a built hierarchy

use std::collections::{BTreeMap, VecDeque};

use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::config::{HierarchyParams, SeriesGroupingType};
use crate::errors::Result;
use crate::features::hierarchy::domain::{Hierarchy, Metaedge, Metagraph};
use crate::features::raw_graph::BaseEdge;

/// Metaedges around one node, split by whether they carry data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Edges {
    pub regular: Vec<Metaedge>,
    pub control: Vec<Metaedge>,
}

impl Edges {
    fn push(&mut self, metaedge: Metaedge) {
        if metaedge.num_regular_edges > 0 {
            self.regular.push(metaedge);
        } else {
            self.control.push(metaedge);
        }
    }

    pub fn len(&self) -> usize {
        self.regular.len() + self.control.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Incoming,
    Outgoing,
}

impl Hierarchy {
    /// Metaedges ending at `name`, plus one edge per in-embedding it consumes
    pub fn predecessors(&self, name: &str) -> Result<Edges> {
        let mut edges = self.one_way_edges(name, Direction::Incoming)?;
        if let Some(leaf) = self.require(name)?.op_leaf() {
            for embed in &leaf.op.in_embeddings {
                for input in leaf.op.inputs.iter().filter(|i| i.name == embed.name) {
                    let mut base = BaseEdge::new(&embed.name, name)
                        .with_output_tensor_key(&input.output_tensor_key);
                    base.is_control_dependency = input.is_control_dependency;
                    edges.push(self.synthetic_edge(base));
                }
            }
        }
        Ok(edges)
    }

    /// Metaedges leaving `name`, plus one edge per out-embedding fed by it
    pub fn successors(&self, name: &str) -> Result<Edges> {
        let mut edges = self.one_way_edges(name, Direction::Outgoing)?;
        if let Some(leaf) = self.require(name)?.op_leaf() {
            for embed in &leaf.op.out_embeddings {
                for input in embed.inputs.iter().filter(|i| i.name == name) {
                    let mut base = BaseEdge::new(name, &embed.name)
                        .with_output_tensor_key(&input.output_tensor_key);
                    base.is_control_dependency = input.is_control_dependency;
                    edges.push(self.synthetic_edge(base));
                }
            }
        }
        Ok(edges)
    }

    fn synthetic_edge(&self, base: BaseEdge) -> Metaedge {
        let (size, _) = self.edge_size(&base);
        let mut metaedge = Metaedge::new(base.source.clone(), base.target.clone());
        metaedge.add_base_edge(base, size);
        metaedge
    }

    fn one_way_edges(&self, name: &str, dir: Direction) -> Result<Edges> {
        let node = self.require(name)?;
        let mut edges = Edges::default();
        let Some(parent) = node.parent.map(|p| self.get(p)) else {
            return Ok(edges);
        };
        let Some(group) = parent.group() else {
            return Ok(edges);
        };

        for metaedge in directed(&group.metagraph, name, dir) {
            edges.push(metaedge.clone());
        }
        if let Some(bridge) = self.bridgegraph(&parent.name)? {
            for metaedge in directed(bridge, name, dir) {
                edges.push(metaedge.clone());
            }
        }
        Ok(edges)
    }

    /// Relative order of a group's children along non-control metaedges
    ///
    /// If a child reaches another through such edges it gets the smaller
    /// index. Indices are not dense and children on cycles or without data
    /// edges may be missing. `None` for op nodes; memoized per group.
    pub fn topological_ordering(&self, name: &str) -> Result<Option<&BTreeMap<String, usize>>> {
        let node = self.require(name)?;
        let Some(group) = node.group() else {
            return Ok(None);
        };
        Ok(Some(group.ordering.get_or_init(|| kahn_order(&group.metagraph))))
    }

    /// Names of non-group nodes under `name`, breadth first
    pub fn leaves(&self, name: &str) -> Result<Vec<String>> {
        let start = self.require(name)?;
        let mut leaves = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            match node.group() {
                Some(group) => {
                    for child in group.metagraph.node_names() {
                        let child = self.require(child)?;
                        queue.push_back(child);
                    }
                }
                None => leaves.push(node.name.clone()),
            }
        }
        Ok(leaves)
    }

    /// Nodes to flag as incompatible with the target device
    ///
    /// An incompatible op in a grouped series is reported once through the
    /// series; in an ungrouped series (per `params` or the build's own
    /// threshold decisions) it is reported itself. Incompatible embeddings
    /// are always reported by name.
    pub fn incompatible_ops(&self, params: &HierarchyParams) -> Result<Vec<String>> {
        let is_ungrouped = |series: &str| {
            params.series_map.get(series) == Some(&SeriesGroupingType::Ungroup)
                || self.series_grouping.get(series) == Some(&SeriesGroupingType::Ungroup)
        };

        let mut found = Vec::new();
        let mut reported_series: AHashSet<&str> = AHashSet::new();
        for leaf_name in self.leaves(&self.root().name)? {
            let Some(leaf) = self.node(&leaf_name).and_then(|n| n.op_leaf()) else {
                continue;
            };
            if !leaf.op.compatible {
                match leaf.owning_series.as_deref() {
                    Some(series) if is_ungrouped(series) => found.push(leaf_name.clone()),
                    Some(series) => {
                        if !reported_series.contains(series) && self.contains(series) {
                            reported_series.insert(series);
                            found.push(series.to_string());
                        }
                    }
                    None => found.push(leaf_name.clone()),
                }
            }
            for embed in leaf.op.in_embeddings.iter().chain(&leaf.op.out_embeddings) {
                if !embed.compatible {
                    found.push(embed.name.clone());
                }
            }
        }
        Ok(found)
    }
}

fn directed<'g>(graph: &'g Metagraph, name: &str, dir: Direction) -> Vec<&'g Metaedge> {
    match dir {
        Direction::Incoming => graph.in_edges(name),
        Direction::Outgoing => graph.out_edges(name),
    }
}

/// Kahn's algorithm over the data-carrying metaedges, seeded by children
/// that are never a destination
fn kahn_order(graph: &Metagraph) -> BTreeMap<String, usize> {
    let mut successors: AHashMap<&str, Vec<&str>> = AHashMap::new();
    let mut in_degree: AHashMap<&str, usize> = AHashMap::new();
    let mut sources: Vec<&str> = Vec::new();

    for metaedge in graph.edges().filter(|e| !e.is_control_only()) {
        let (v, w) = (metaedge.v.as_str(), metaedge.w.as_str());
        if !successors.contains_key(v) {
            sources.push(v);
        }
        successors.entry(v).or_default().push(w);
        *in_degree.entry(w).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = sources
        .into_iter()
        .filter(|v| !in_degree.contains_key(v))
        .collect();
    let mut ordering = BTreeMap::new();
    while let Some(child) = queue.pop_front() {
        ordering.insert(child.to_string(), ordering.len());
        for &next in successors.get(child).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }
    ordering
}
