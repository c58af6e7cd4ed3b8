//! Series detection
//!
//! Sibling ops that share an op type and differ only by a number in their
//! names (`layer_1`, `layer_2`, `layer_3`) are collapsed into a series node.
//! Groups are processed innermost first, so a series never spans namespaces.
//!
//! Two naming schemes are supported:
//! - numeric suffix: `prefix_<digits>` at the end of the leaf name
//! - anywhere: any digit run in the leaf; each member picks the run shared by
//!   the most siblings

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{HierarchyParams, SeriesGroupingType};
use crate::errors::{HierarchyError, Result};
use crate::features::hierarchy::domain::{
    GraphKind, GroupData, HierNode, Hierarchy, NodeHistograms, NodeId, NodeKind, SeriesNode,
};

static NUMERIC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\D*)_(\d+)$").expect("static regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("static regex"));

/// `[parent/]prefix[start-end]suffix`, or `prefix#suffix` without a range
pub fn series_node_name(
    prefix: &str,
    suffix: &str,
    parent: &str,
    range: Option<(i64, i64)>,
) -> String {
    let numbers = match range {
        Some((start, end)) => format!("[{start}-{end}]"),
        None => "#".to_string(),
    };
    if parent.is_empty() {
        format!("{prefix}{numbers}{suffix}")
    } else {
        format!("{parent}/{prefix}{numbers}{suffix}")
    }
}

/// Detected run of consecutively numbered siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCandidate {
    pub name: String,
    pub prefix: String,
    pub suffix: String,
    pub parent_path: String,
    /// Op shared by the members
    pub cluster_id: String,
    pub ids: Vec<i64>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
struct Numbered {
    name: String,
    prefix: String,
    suffix: String,
    parent: String,
    id: i64,
}

fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => ("", name),
    }
}

/// Leaf with no usable number: the whole leaf is the prefix, and a trailing
/// `*` group marker moves to the suffix
fn unnumbered(name: &str) -> Numbered {
    let (parent, leaf) = split_name(name);
    let (prefix, suffix) = match leaf.strip_suffix('*') {
        Some(stem) => (stem, "*"),
        None => (leaf, ""),
    };
    Numbered {
        name: name.to_string(),
        prefix: prefix.to_string(),
        suffix: suffix.to_string(),
        parent: parent.to_string(),
        id: 0,
    }
}

fn numeric_suffix(name: &str) -> Numbered {
    let (parent, leaf) = split_name(name);
    NUMERIC_SUFFIX
        .captures(leaf)
        .and_then(|caps| {
            let id = caps[2].parse::<i64>().ok()?;
            Some(Numbered {
                name: name.to_string(),
                prefix: caps[1].to_string(),
                suffix: String::new(),
                parent: parent.to_string(),
                id,
            })
        })
        .unwrap_or_else(|| unnumbered(name))
}

/// Every way of reading one digit run of the leaf as the series number
fn digit_runs(name: &str) -> Vec<Numbered> {
    let (parent, leaf) = split_name(name);
    let runs: Vec<Numbered> = DIGIT_RUN
        .find_iter(leaf)
        .filter_map(|m| {
            let id = m.as_str().parse::<i64>().ok()?;
            Some(Numbered {
                name: name.to_string(),
                prefix: leaf[..m.start()].to_string(),
                suffix: leaf[m.end()..].to_string(),
                parent: parent.to_string(),
                id,
            })
        })
        .collect();
    if runs.is_empty() {
        vec![unnumbered(name)]
    } else {
        runs
    }
}

fn unranged_name(n: &Numbered) -> String {
    series_node_name(&n.prefix, &n.suffix, &n.parent, None)
}

/// Sort by number and cut into consecutive runs; runs of two or more
/// become candidates
fn split_runs(
    cluster_id: &str,
    mut entries: Vec<Numbered>,
    out: &mut BTreeMap<String, SeriesCandidate>,
) {
    if entries.len() < 2 {
        return;
    }
    entries.sort_by_key(|e| e.id);

    let mut run: Vec<Numbered> = Vec::new();
    for entry in entries {
        if let Some(last) = run.last() {
            if last.id.checked_add(1) != Some(entry.id) {
                emit_run(cluster_id, std::mem::take(&mut run), out);
            }
        }
        run.push(entry);
    }
    emit_run(cluster_id, run, out);
}

fn emit_run(cluster_id: &str, run: Vec<Numbered>, out: &mut BTreeMap<String, SeriesCandidate>) {
    if run.len() < 2 {
        return;
    }
    let first = &run[0];
    let last = &run[run.len() - 1];
    let name = series_node_name(&first.prefix, &first.suffix, &first.parent, Some((first.id, last.id)));
    let candidate = SeriesCandidate {
        name: name.clone(),
        prefix: first.prefix.clone(),
        suffix: first.suffix.clone(),
        parent_path: first.parent.clone(),
        cluster_id: cluster_id.to_string(),
        ids: run.iter().map(|n| n.id).collect(),
        members: run.into_iter().map(|n| n.name).collect(),
    };
    out.insert(name, candidate);
}

/// Series whose members end in `_<number>`
pub fn detect_numeric_suffix_series(
    clusters: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, SeriesCandidate> {
    let mut found = BTreeMap::new();
    for (cluster_id, members) in clusters {
        if members.len() <= 1 {
            continue;
        }
        let mut by_series: BTreeMap<String, Vec<Numbered>> = BTreeMap::new();
        for name in members {
            let numbered = numeric_suffix(name);
            by_series.entry(unranged_name(&numbered)).or_default().push(numbered);
        }
        for entries in by_series.into_values() {
            split_runs(cluster_id, entries, &mut found);
        }
    }
    found
}

/// Series numbered anywhere in the leaf name
pub fn detect_series_anywhere(
    clusters: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, SeriesCandidate> {
    let mut found = BTreeMap::new();
    for (cluster_id, members) in clusters {
        if members.len() <= 1 {
            continue;
        }

        let readings: Vec<Vec<Numbered>> = members.iter().map(|name| digit_runs(name)).collect();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for reading in readings.iter().flatten() {
            *counts.entry(unranged_name(reading)).or_insert(0) += 1;
        }

        let mut by_series: BTreeMap<String, Vec<Numbered>> = BTreeMap::new();
        for reading in readings {
            let mut best: Option<(usize, Numbered)> = None;
            for candidate in reading {
                let count = counts.get(&unranged_name(&candidate)).copied().unwrap_or(0);
                if best.as_ref().map_or(true, |(c, _)| count > *c) {
                    best = Some((count, candidate));
                }
            }
            if let Some((_, chosen)) = best {
                by_series.entry(unranged_name(&chosen)).or_default().push(chosen);
            }
        }
        for entries in by_series.into_values() {
            split_runs(cluster_id, entries, &mut found);
        }
    }
    found
}

/// Op children of a group with a non-empty op, keyed by op
fn cluster_ops(h: &Hierarchy, group: NodeId) -> BTreeMap<String, Vec<String>> {
    let mut clusters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(data) = h.get(group).group() else {
        return clusters;
    };
    for child in data.metagraph.node_names() {
        let Some(leaf) = h.node(child).and_then(|n| n.op_leaf()) else {
            continue;
        };
        if !leaf.op.op.is_empty() {
            clusters.entry(leaf.op.op.clone()).or_default().push(child.to_string());
        }
    }
    clusters
}

/// Detect and collapse series in every group, innermost first
///
/// A threshold of zero disables detection. Runs shorter than the threshold
/// are recorded as ungrouped unless the caller already decided for them.
pub fn group_series(h: &mut Hierarchy, params: &HierarchyParams) -> Result<()> {
    if params.series_node_min_size == 0 {
        debug!("Series detection disabled");
        return Ok(());
    }
    let mut grouping = params.series_map.clone();
    let root = h.root_id();
    group_series_in(h, root, params, &mut grouping)?;

    info!(
        series = h.series_names.values().collect::<BTreeSet<_>>().len(),
        ungrouped = grouping.values().filter(|g| **g == SeriesGroupingType::Ungroup).count(),
        "Detected series"
    );
    h.series_grouping = grouping;
    Ok(())
}

fn group_series_in(
    h: &mut Hierarchy,
    group: NodeId,
    params: &HierarchyParams,
    grouping: &mut BTreeMap<String, SeriesGroupingType>,
) -> Result<()> {
    let nested: Vec<NodeId> = match h.get(group).group() {
        Some(data) => data
            .metagraph
            .node_names()
            .filter_map(|name| h.id_of(name))
            .filter(|&id| matches!(h.get(id).kind, NodeKind::Meta(_)))
            .collect(),
        None => return Ok(()),
    };
    for child in nested {
        group_series_in(h, child, params, grouping)?;
    }

    let clusters = cluster_ops(h, group);
    let detected = if params.use_generalized_series_patterns {
        detect_series_anywhere(&clusters)
    } else {
        detect_numeric_suffix_series(&clusters)
    };

    for (name, candidate) in detected {
        for member in &candidate.members {
            if let Some(id) = h.id_of(member) {
                if let Some(leaf) = h.get_mut(id).op_leaf_mut() {
                    leaf.owning_series.get_or_insert_with(|| name.clone());
                }
            }
        }

        if candidate.members.len() < params.series_node_min_size {
            grouping
                .entry(name.clone())
                .or_insert(SeriesGroupingType::Ungroup);
        }
        if grouping.get(&name) == Some(&SeriesGroupingType::Ungroup) {
            debug!(series = %name, members = candidate.members.len(), "Leaving series ungrouped");
            continue;
        }
        collapse(h, group, candidate)?;
    }
    Ok(())
}

fn collapse(h: &mut Hierarchy, group: NodeId, candidate: SeriesCandidate) -> Result<()> {
    let SeriesCandidate {
        name,
        prefix,
        suffix,
        parent_path,
        cluster_id,
        ids,
        members,
    } = candidate;

    let series_id = h
        .alloc(HierNode {
            name: name.clone(),
            parent: Some(group),
            kind: NodeKind::Series(SeriesNode {
                group: GroupData::new(&name, GraphKind::Series),
                prefix,
                suffix,
                parent_path,
                cluster_id,
                ids,
            }),
        })
        .map_err(|_| {
            HierarchyError::structural(format!("series name '{name}' collides with an existing node"))
        })?;
    h.group_mut(group)?.metagraph.add_node(&name);

    let mut histograms = NodeHistograms::default();
    for member in &members {
        let id = h.id_of(member).ok_or_else(|| HierarchyError::lookup(member))?;
        let node = h.get_mut(id);
        node.parent = Some(series_id);
        histograms.add(node.histograms());

        h.group_mut(series_id)?.metagraph.add_node(member);
        h.group_mut(group)?.metagraph.remove_node(member);
        h.series_names.insert(member.clone(), name.clone());
    }
    h.group_mut(series_id)?.histograms = histograms;

    debug!(series = %name, members = members.len(), "Collapsed series");
    Ok(())
}
