//! Hierarchy-specific assertions

use opgraph_hierarchy::{Hierarchy, NodeHistograms};

/// Assert that every group's histograms are the sum of its children's
pub fn assert_histograms_consistent(h: &Hierarchy) {
    let mut pending = vec![h.root().name.clone()];
    while let Some(name) = pending.pop() {
        let node = h.node(&name).expect("indexed node");
        let Some(group) = node.group() else {
            continue;
        };
        let mut sum = NodeHistograms::default();
        for child in group.metagraph.node_names() {
            sum.add(h.node(child).expect("indexed child").histograms());
            pending.push(child.to_string());
        }
        assert_eq!(
            group.histograms.op_histogram, sum.op_histogram,
            "op histogram of '{name}' differs from its children"
        );
        assert_eq!(
            group.histograms.cardinality, sum.cardinality,
            "cardinality of '{name}' differs from its children"
        );
        assert_eq!(
            group.histograms.device_histogram, sum.device_histogram,
            "device histogram of '{name}' differs from its children"
        );
        assert_eq!(
            group.histograms.compatibility, sum.compatibility,
            "compatibility of '{name}' differs from its children"
        );
    }
}

/// Assert that `name` is a group whose direct children are `expected`
pub fn assert_children(h: &Hierarchy, name: &str, expected: &[&str]) {
    let children = h.children(name).expect("known group");
    assert_eq!(children, expected, "children of '{name}'");
}
