// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! GPU-type lookup maps and capacity aggregation derived from node records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::slurm::NodeRecord;

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEM: &str = "mem_gb";

/// Node→GPU-type and partition→GPU-type lookups, restricted to keys that map
/// to exactly one GPU type across the whole capacity snapshot. Ambiguous
/// keys are dropped so that attribution falls through to the next level
/// rather than guessing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapacityIndex {
    pub node_gpu: HashMap<String, String>,
    pub partition_gpu: HashMap<String, String>,
}

impl CapacityIndex {
    pub fn build(nodes: &[NodeRecord]) -> Self {
        let mut node_types: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut partition_types: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        for node in nodes {
            let types: BTreeSet<&str> = node
                .gpus
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(gpu_type, _)| gpu_type.as_str())
                .collect();
            node_types.entry(&node.node).or_default().extend(&types);
            for partition in &node.partitions {
                partition_types.entry(partition).or_default().extend(&types);
            }
        }

        Self {
            node_gpu: keep_unambiguous(node_types),
            partition_gpu: keep_unambiguous(partition_types),
        }
    }
}

fn keep_unambiguous(map: BTreeMap<&str, BTreeSet<&str>>) -> HashMap<String, String> {
    map.into_iter()
        .filter_map(|(key, types)| {
            if types.len() == 1 {
                let only = types.into_iter().next()?;
                Some((key.to_string(), only.to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// Every GPU type present anywhere in the capacity snapshot, sorted.
pub fn gpu_types(nodes: &[NodeRecord]) -> BTreeSet<String> {
    nodes
        .iter()
        .flat_map(|n| n.gpus.keys().cloned())
        .collect()
}

/// Sum a node subset into one capacity record: `(resource name, capacity)`
/// in the order cpu, mem_gb, then GPU types sorted by name. Nodes appearing
/// more than once count once, and resources whose aggregate is zero are
/// dropped so downstream percentage computations never divide by zero.
pub fn aggregate_capacity<'a, I>(nodes: I, all_gpu_types: &BTreeSet<String>) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a NodeRecord>,
{
    let mut seen = BTreeSet::new();
    let mut cpus = 0u64;
    let mut mem_gb = 0f64;
    let mut gpus: BTreeMap<&str, u64> = BTreeMap::new();

    for node in nodes {
        if !seen.insert(node.node.as_str()) {
            continue;
        }
        cpus += node.cpus;
        mem_gb += node.mem_gb;
        for (gpu_type, count) in &node.gpus {
            *gpus.entry(gpu_type).or_insert(0) += count;
        }
    }

    let mut out = Vec::new();
    if cpus > 0 {
        out.push((RESOURCE_CPU.to_string(), cpus as f64));
    }
    if mem_gb > 0.0 {
        out.push((RESOURCE_MEM.to_string(), mem_gb));
    }
    for gpu_type in all_gpu_types {
        if let Some(count) = gpus.get(gpu_type.as_str()).filter(|c| **c > 0) {
            out.push((gpu_type.clone(), *count as f64));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn node(name: &str, partitions: &[&str], gpus: &[(&str, u64)]) -> NodeRecord {
        NodeRecord {
            node: name.to_string(),
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            cpus: 64,
            mem_gb: 256.0,
            gpus: gpus.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
        }
    }

    #[test]
    fn single_type_nodes_and_partitions_are_indexed() {
        let nodes = vec![
            node("g1", &["gpu_a"], &[("h200", 4)]),
            node("g2", &["gpu_a"], &[("h200", 4)]),
        ];
        let index = CapacityIndex::build(&nodes);
        assert_eq!(index.node_gpu.get("g1").map(String::as_str), Some("h200"));
        assert_eq!(
            index.partition_gpu.get("gpu_a").map(String::as_str),
            Some("h200")
        );
    }

    #[test]
    fn multi_type_node_is_dropped() {
        let nodes = vec![node("g1", &["gpu_a"], &[("h200", 2), ("mig_1g", 4)])];
        let index = CapacityIndex::build(&nodes);
        assert!(index.node_gpu.is_empty());
        assert!(index.partition_gpu.is_empty());
    }

    #[test]
    fn partition_spanning_two_types_is_dropped_but_nodes_kept() {
        let nodes = vec![
            node("g1", &["mixed"], &[("h200", 4)]),
            node("g2", &["mixed"], &[("mig_1g", 8)]),
        ];
        let index = CapacityIndex::build(&nodes);
        assert_eq!(index.node_gpu.len(), 2);
        assert!(index.partition_gpu.is_empty());
    }

    #[test]
    fn gpuless_nodes_do_not_enter_the_node_index() {
        let nodes = vec![node("x1", &["cpu"], &[])];
        let index = CapacityIndex::build(&nodes);
        assert!(index.node_gpu.is_empty());
        assert!(index.partition_gpu.is_empty());
    }

    #[test]
    fn zero_count_gpu_entries_do_not_create_ambiguity() {
        let nodes = vec![node("g1", &["gpu_a"], &[("h200", 4), ("mig_1g", 0)])];
        let index = CapacityIndex::build(&nodes);
        assert_eq!(index.node_gpu.get("g1").map(String::as_str), Some("h200"));
    }

    #[test]
    fn gpu_types_is_the_sorted_union() {
        let nodes = vec![
            node("g1", &["a"], &[("mig_1g", 8)]),
            node("g2", &["b"], &[("h200", 4)]),
        ];
        let types: Vec<String> = gpu_types(&nodes).into_iter().collect();
        assert_eq!(types, vec!["h200", "mig_1g"]);
    }

    #[test]
    fn aggregation_deduplicates_nodes_and_drops_zero_resources() {
        let g1 = node("g1", &["a"], &[("h200", 4), ("mig_1g", 0)]);
        let types = BTreeSet::from(["h200".to_string(), "mig_1g".to_string()]);
        let capacity = aggregate_capacity([&g1, &g1], &types);
        assert_eq!(
            capacity,
            vec![
                ("cpu".to_string(), 64.0),
                ("mem_gb".to_string(), 256.0),
                ("h200".to_string(), 4.0),
            ]
        );
    }

    #[test]
    fn empty_subset_has_no_resources() {
        let types = BTreeSet::new();
        assert!(aggregate_capacity([], &types).is_empty());
    }
}
