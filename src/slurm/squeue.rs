// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Parsing of `squeue` output into job records.
//!
//! Slurm does not expose every field of interest through a single format
//! option, so the queue is captured twice: the long `--Format` variant for
//! pending time and the allocated-TRES string, and the short `--format`
//! variant for state, reason, partition, user, per-node TRES and nodelist.
//! The two result sets are outer-merged on job id.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::nodelist::{expand_nodelist, FormatError};

pub const SQUEUE_LONG_ARGS: &[&str] = &["-r", "-a", "-h", "--Format=JobArrayID,PendingTime,tres-alloc:100"];
pub const SQUEUE_SHORT_ARGS: &[&str] = &["-r", "-a", "-h", "--format=%i|%T|%r|%P|%u|%b|%N"];

/// Pending reasons are truncated to keep display widths bounded.
const REASON_MAX_CHARS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Pending,
    Other(String),
}

impl JobState {
    fn from_raw(raw: &str) -> Self {
        match raw {
            "RUNNING" => Self::Running,
            "PENDING" => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::Pending => f.write_str("PENDING"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// One job from the queue snapshot. `gpu_by_type` and `indeterminate_gpus`
/// start at zero and are filled in exactly once by GPU attribution; the sum
/// of both then equals `gpus_total`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    pub user: String,
    /// The partition field as reported, possibly a comma-joined list.
    pub partition: String,
    pub partitions: Vec<String>,
    pub nodes: Vec<String>,
    pub cpus: u64,
    pub mem_gb: u64,
    pub gpus_total: u64,
    pub gpus_per_node: f64,
    /// Declared GPU type from the job's per-node TRES request, if any.
    pub gpu_type_hint: Option<String>,
    pub gpu_by_type: BTreeMap<String, f64>,
    pub indeterminate_gpus: f64,
    pub pending: Duration,
    pub reason: String,
}

#[derive(Debug, Default)]
struct LongRow {
    pending_secs: u64,
    tres_alloc: String,
}

#[derive(Debug, Default)]
struct ShortRow {
    state: String,
    reason: String,
    partition: String,
    user: String,
    tres_per_node: String,
    nodelist: String,
}

/// Merge the two squeue captures into job records. Numeric fields that are
/// missing or garbled come out as zero; only a malformed nodelist is fatal.
pub fn parse_queue(long_raw: &str, short_raw: &str) -> Result<Vec<JobRecord>, FormatError> {
    let long_rows = parse_long(long_raw);
    let mut short_rows = parse_short(short_raw);

    let mut jobs = Vec::with_capacity(long_rows.len());
    for (job_id, long) in long_rows {
        let short = short_rows.remove(&job_id).unwrap_or_default();
        jobs.push(build_job(job_id, &long, &short)?);
    }
    // Jobs only present in the short capture still enter the snapshot, with
    // allocation numbers normalized to zero.
    for (job_id, short) in short_rows {
        jobs.push(build_job(job_id, &LongRow::default(), &short)?);
    }
    Ok(jobs)
}

fn build_job(job_id: String, long: &LongRow, short: &ShortRow) -> Result<JobRecord, FormatError> {
    let cpus = tres_count(&long.tres_alloc, "cpu");
    let node_count = tres_count(&long.tres_alloc, "node");
    let gpus_total = tres_count(&long.tres_alloc, "gpu");
    let gpus_per_node = if node_count > 0 {
        gpus_total as f64 / node_count as f64
    } else {
        0.0
    };

    let partition = short.partition.clone();
    let partitions = partition
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    Ok(JobRecord {
        job_id,
        state: JobState::from_raw(&short.state),
        user: short.user.clone(),
        partition,
        partitions,
        nodes: expand_nodelist(&short.nodelist)?,
        cpus,
        mem_gb: tres_mem_gb(&long.tres_alloc),
        gpus_total,
        gpus_per_node,
        gpu_type_hint: gpu_type_hint(&short.tres_per_node),
        gpu_by_type: BTreeMap::new(),
        indeterminate_gpus: 0.0,
        pending: Duration::from_secs(long.pending_secs),
        reason: short.reason.chars().take(REASON_MAX_CHARS).collect(),
    })
}

fn parse_long(raw: &str) -> Vec<(String, LongRow)> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let job_id = fields.next()?;
            let pending_secs = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            let tres_alloc = fields.next().unwrap_or("").to_string();
            Some((
                job_id.to_string(),
                LongRow {
                    pending_secs,
                    tres_alloc,
                },
            ))
        })
        .collect()
}

fn parse_short(raw: &str) -> HashMap<String, ShortRow> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut fields = line.splitn(7, '|');
            let job_id = fields.next()?;
            Some((
                job_id.to_string(),
                ShortRow {
                    state: fields.next().unwrap_or("").to_string(),
                    reason: fields.next().unwrap_or("").to_string(),
                    partition: fields.next().unwrap_or("").to_string(),
                    user: fields.next().unwrap_or("").to_string(),
                    tres_per_node: fields.next().unwrap_or("").to_string(),
                    nodelist: normalize_nodelist(fields.next().unwrap_or("")),
                },
            ))
        })
        .collect()
}

fn normalize_nodelist(raw: &str) -> String {
    // squeue reports "(null)" for jobs without assigned nodes.
    if raw == "(null)" {
        String::new()
    } else {
        raw.to_string()
    }
}

/// Look up an integer count in a TRES string such as
/// `cpu=8,mem=32G,node=2,billing=8,gres/gpu=4`. The `gres/` class prefix is
/// transparent, so `gpu` finds `gres/gpu=4` but not the typed
/// `gres/gpu:h200=4` entry.
fn tres_count(tres: &str, key: &str) -> u64 {
    tres_value(tres, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn tres_value<'a>(tres: &'a str, key: &str) -> Option<&'a str> {
    tres.split(',').find_map(|entry| {
        let (name, value) = entry.split_once('=')?;
        let name = name.strip_prefix("gres/").unwrap_or(name);
        (name == key).then_some(value)
    })
}

/// Memory in whole GB from the unit-tagged TRES entry (`mem=512000M`).
fn tres_mem_gb(tres: &str) -> u64 {
    let Some(value) = tres_value(tres, "mem") else {
        return 0;
    };
    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };
    let number: f64 = match digits.parse() {
        Ok(n) => n,
        Err(_) => return 0,
    };
    let gb_per_unit = match unit {
        Some('K') => 1e-6,
        Some('M') => 1e-3,
        Some('G') => 1.0,
        Some('T') => 1000.0,
        _ => 1.0,
    };
    (number * gb_per_unit).round() as u64
}

/// Declared GPU type out of a per-node TRES request such as
/// `gres/gpu:h200:2`. A request without a type (`gres/gpu:2` carries only a
/// count, which no known type will match) or without a GPU entry yields
/// nothing.
fn gpu_type_hint(tres_per_node: &str) -> Option<String> {
    let start = tres_per_node.find("gpu:")? + "gpu:".len();
    let rest = &tres_per_node[start..];
    let end = rest
        .find([':', ',', '('])
        .unwrap_or(rest.len());
    let hint = &rest[..end];
    if hint.is_empty() || hint == "none" {
        None
    } else {
        Some(hint.to_string())
    }
}
