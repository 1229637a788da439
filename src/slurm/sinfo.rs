// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Parsing of `sinfo` per-node output into capacity records.
//!
//! The expected input is one line per (node, partition) pair in the shape
//! `NODELIST|PARTITION|CPUS|MEMORY|GRES`; lines for the same node are merged
//! into a single [`NodeRecord`] carrying the full partition set.

use std::collections::{BTreeMap, BTreeSet};

pub const SINFO_ARGS: &[&str] = &["-a", "-h", "--format=%N|%P|%c|%m|%G", "-N"];

/// Capacity of one node. GPU counts are keyed by GPU type name; a node
/// without GPUs has an empty map.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node: String,
    pub partitions: BTreeSet<String>,
    pub cpus: u64,
    pub mem_gb: f64,
    pub gpus: BTreeMap<String, u64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("sinfo line {line:?} is missing the {field} field")]
    MissingField { line: String, field: &'static str },
    #[error("sinfo line {line:?} has a non-numeric {field} field")]
    InvalidNumber { line: String, field: &'static str },
}

pub fn parse_sinfo(raw: &str) -> Result<Vec<NodeRecord>, ParseError> {
    let cleaned = strip_socket_ranges(raw).replace('*', "");

    let mut by_node: BTreeMap<String, NodeRecord> = BTreeMap::new();
    for line in cleaned.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let row = parse_line(line)?;
        match by_node.get_mut(&row.node) {
            // Repeated lines describe the same node under another partition;
            // the per-node capacity columns are identical on each.
            Some(existing) => existing.partitions.extend(row.partitions),
            None => {
                by_node.insert(row.node.clone(), row);
            }
        }
    }
    Ok(by_node.into_values().collect())
}

fn parse_line(line: &str) -> Result<NodeRecord, ParseError> {
    let missing = |field| ParseError::MissingField {
        line: line.to_string(),
        field,
    };

    let mut fields = line.split('|');
    let node = fields.next().filter(|s| !s.is_empty()).ok_or(missing("node"))?;
    let partition = fields.next().filter(|s| !s.is_empty()).ok_or(missing("partition"))?;
    let cpus = fields.next().ok_or(missing("cpus"))?;
    let memory = fields.next().ok_or(missing("memory"))?;
    let gres = fields.next().unwrap_or("");

    let cpus: u64 = cpus.trim().parse().map_err(|_| ParseError::InvalidNumber {
        line: line.to_string(),
        field: "cpus",
    })?;
    let mem_mb: f64 = memory.trim().parse().map_err(|_| ParseError::InvalidNumber {
        line: line.to_string(),
        field: "memory",
    })?;

    Ok(NodeRecord {
        node: node.to_string(),
        partitions: BTreeSet::from([partition.to_string()]),
        cpus,
        mem_gb: mem_mb / 1000.0,
        gpus: parse_gres(gres),
    })
}

/// Extract `gpu:<type>:<count>` entries from a GRES string. Entries without
/// a type (`gpu:4`) or with a different resource class are ignored; repeated
/// types accumulate.
fn parse_gres(gres: &str) -> BTreeMap<String, u64> {
    let mut gpus = BTreeMap::new();
    for entry in gres.split(',') {
        let Some(rest) = entry.trim().strip_prefix("gpu:") else {
            continue;
        };
        let Some((gpu_type, count)) = rest.rsplit_once(':') else {
            continue;
        };
        if gpu_type.is_empty() {
            continue;
        }
        if let Ok(count) = count.trim().parse::<u64>() {
            *gpus.entry(gpu_type.to_string()).or_insert(0) += count;
        }
    }
    gpus
}

/// Remove `(S:...)` socket-range annotations that sinfo appends to GRES
/// entries.
fn strip_socket_ranges(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("(S:") {
        out.push_str(&rest[..start]);
        match rest[start..].find(')') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
g10|gpu_std*|128|512000|gpu:h200:4(S:0-1)
g10|gpu_flexbackfill|128|512000|gpu:h200:4(S:0-1)
g20|gpu_std|128|512000|gpu:mig_1g:8,gpu:mig_2g:4
x1|cpu_std|56|190000|(null)
x2|cpu_std|56|190000|
";

    #[test]
    fn merges_partitions_per_node() {
        let nodes = parse_sinfo(SAMPLE).unwrap();
        let g10 = nodes.iter().find(|n| n.node == "g10").unwrap();
        assert_eq!(
            g10.partitions,
            BTreeSet::from(["gpu_std".to_string(), "gpu_flexbackfill".to_string()])
        );
        assert_eq!(g10.cpus, 128);
        assert_eq!(g10.mem_gb, 512.0);
    }

    #[test]
    fn strips_socket_ranges_and_default_flag() {
        let nodes = parse_sinfo(SAMPLE).unwrap();
        let g10 = nodes.iter().find(|n| n.node == "g10").unwrap();
        assert_eq!(g10.gpus, BTreeMap::from([("h200".to_string(), 4)]));
    }

    #[test]
    fn splits_multiple_gpu_types() {
        let nodes = parse_sinfo(SAMPLE).unwrap();
        let g20 = nodes.iter().find(|n| n.node == "g20").unwrap();
        assert_eq!(
            g20.gpus,
            BTreeMap::from([("mig_1g".to_string(), 8), ("mig_2g".to_string(), 4)])
        );
    }

    #[test]
    fn gpuless_node_has_empty_map() {
        let nodes = parse_sinfo(SAMPLE).unwrap();
        let x1 = nodes.iter().find(|n| n.node == "x1").unwrap();
        assert!(x1.gpus.is_empty());
        let x2 = nodes.iter().find(|n| n.node == "x2").unwrap();
        assert!(x2.gpus.is_empty());
    }

    #[test]
    fn untyped_gpu_entries_are_ignored() {
        assert!(parse_gres("gpu:4").is_empty());
        assert!(parse_gres("fpga:xilinx:2").is_empty());
    }

    #[test]
    fn repeated_gpu_type_accumulates() {
        let gpus = parse_gres("gpu:h200:2,gpu:h200:2");
        assert_eq!(gpus, BTreeMap::from([("h200".to_string(), 4)]));
    }

    #[test]
    fn non_numeric_cpus_is_an_error() {
        let err = parse_sinfo("n1|p1|lots|1000|").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { field: "cpus", .. }));
    }

    #[test]
    fn missing_fields_are_an_error() {
        let err = parse_sinfo("n1|p1").unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "cpus", .. }));
    }
}
