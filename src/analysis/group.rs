// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! A materialized analysis group: one named, filtered view of the queue and
//! the matching capacity, with its summary tables precomputed.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::capacity::{RESOURCE_CPU, RESOURCE_MEM};
use super::table::{format_duration, Cell, Table};
use crate::slurm::{JobRecord, JobState};

/// Reasons that dominate queue-time reporting and are listed first.
pub const PRIORITY_REASONS: [&str; 2] = ["Priority", "Resources"];

#[derive(Debug, Clone)]
pub struct AnalysisGroup {
    pub name: String,
    pub state: JobState,
    pub jobs: Vec<JobRecord>,
    /// Non-zero resources only, in the order cpu, mem_gb, GPU types.
    pub capacity: Vec<(String, f64)>,

    pub summary: Table,
    pub allocation: Table,
    pub by_user: Table,
    pub by_partition: Table,
    pub pending_by_reason: Table,
}

impl AnalysisGroup {
    /// Build the group and all five derived views. `jobs` is the filtered
    /// subset for exactly one job state; `capacity` the group's aggregated
    /// capacity record with zero-capacity resources already dropped.
    pub fn new(
        name: &str,
        state: JobState,
        jobs: Vec<JobRecord>,
        capacity: Vec<(String, f64)>,
    ) -> Self {
        let mut group = Self {
            name: name.to_string(),
            state,
            jobs,
            capacity,
            summary: Table::new(["Metric", "Value"]),
            allocation: Table::new(["Resource", "Allocation", "Capacity", "Allocation %"]),
            by_user: Table::new([""]),
            by_partition: Table::new([""]),
            pending_by_reason: Table::new([""]),
        };
        group.summary = group.compute_summary();
        group.allocation = group.compute_allocation();
        group.by_user = group.compute_grouped_allocation("user", |job| job.user.clone());
        group.by_partition =
            group.compute_grouped_allocation("partition", |job| job.partition.clone());
        group.pending_by_reason = group.compute_pending_by_reason();
        group
    }

    fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.capacity.iter().map(|(name, _)| name.as_str())
    }

    fn capacity_of(&self, resource: &str) -> Option<f64> {
        self.capacity
            .iter()
            .find(|(name, _)| name == resource)
            .map(|(_, value)| *value)
    }

    fn gpu_resource_names(&self) -> Vec<&str> {
        self.resource_names()
            .filter(|name| *name != RESOURCE_CPU && *name != RESOURCE_MEM)
            .collect()
    }

    fn compute_summary(&self) -> Table {
        let users: BTreeSet<&str> = self.jobs.iter().map(|j| j.user.as_str()).collect();
        let job_ids: BTreeSet<&str> = self.jobs.iter().map(|j| j.job_id.as_str()).collect();
        let median = median_pending(self.jobs.iter());

        let mut table = Table::new(["Metric", "Value"]);
        table.push_row(vec![Cell::text("Users"), Cell::Int(users.len() as i64)]);
        table.push_row(vec![Cell::text("Jobs"), Cell::Int(job_ids.len() as i64)]);
        table.push_row(vec![
            Cell::text("Pending Time (Median)"),
            match median {
                Some(duration) => Cell::text(format_duration(duration)),
                None => Cell::text("N/A"),
            },
        ]);
        table
    }

    fn compute_allocation(&self) -> Table {
        let mut table = Table::new(["Resource", "Allocation", "Capacity", "Allocation %"]);
        for (resource, capacity) in &self.capacity {
            let allocation: f64 = self
                .jobs
                .iter()
                .map(|job| resource_value(job, resource))
                .sum();
            // Zero-capacity resources were dropped upstream, so the
            // percentage is always well-defined.
            let percent = (allocation / capacity * 100.0).round() as i64;
            table.push_row(vec![
                Cell::text(resource.clone()),
                Cell::Int(allocation.round() as i64),
                Cell::Int(capacity.round() as i64),
                Cell::Int(percent),
            ]);
        }
        table
    }

    /// Job count, cpu/mem sums with capacity percentages, and a compact GPU
    /// usage string, grouped by `key` (user or partition).
    fn compute_grouped_allocation(
        &self,
        key_column: &str,
        key: impl Fn(&JobRecord) -> String,
    ) -> Table {
        let mut table = Table::new([
            key_column,
            "jobs",
            RESOURCE_CPU,
            "cpu %",
            RESOURCE_MEM,
            "mem_gb %",
            "gpu",
        ]);

        let mut groups: BTreeMap<String, Vec<&JobRecord>> = BTreeMap::new();
        for job in &self.jobs {
            groups.entry(key(job)).or_default().push(job);
        }

        let gpu_names = self.gpu_resource_names();
        for (group_key, jobs) in groups {
            let cpu: f64 = jobs.iter().map(|j| j.cpus as f64).sum();
            let mem: f64 = jobs.iter().map(|j| j.mem_gb as f64).sum();
            table.push_row(vec![
                Cell::text(group_key),
                Cell::Int(jobs.len() as i64),
                Cell::Int(cpu.round() as i64),
                percent_cell(cpu, self.capacity_of(RESOURCE_CPU)),
                Cell::Int(mem.round() as i64),
                percent_cell(mem, self.capacity_of(RESOURCE_MEM)),
                Cell::text(gpu_usage_string(&jobs, &gpu_names)),
            ]);
        }
        table
    }

    fn compute_pending_by_reason(&self) -> Table {
        let mut columns = vec!["partition", "reason", "jobs", "median pending time"];
        columns.extend(self.resource_names());
        let mut table = Table::new(columns);

        let mut groups: BTreeMap<(String, String), Vec<&JobRecord>> = BTreeMap::new();
        for job in self.jobs.iter().filter(|j| j.state == JobState::Pending) {
            groups
                .entry((job.partition.clone(), job.reason.clone()))
                .or_default()
                .push(job);
        }

        let mut rows = Vec::with_capacity(groups.len());
        for ((partition, reason), jobs) in groups {
            let mut row = vec![
                Cell::text(partition),
                Cell::text(reason.clone()),
                Cell::Int(jobs.len() as i64),
                match median_pending(jobs.iter().copied()) {
                    Some(duration) => Cell::text(format_duration(duration)),
                    None => Cell::text("N/A"),
                },
            ];
            for resource in self.resource_names() {
                let sum: f64 = jobs.iter().map(|j| resource_value(j, resource)).sum();
                row.push(Cell::Int(sum.round() as i64));
            }
            rows.push((reason, row));
        }

        // Priority/Resources rows first, otherwise keeping the grouped
        // (partition, reason) order.
        let (top, bottom): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|(reason, _)| PRIORITY_REASONS.contains(&reason.as_str()));
        for (_, row) in top.into_iter().chain(bottom) {
            table.push_row(row);
        }
        table
    }
}

/// A job's allocation of one named resource.
fn resource_value(job: &JobRecord, resource: &str) -> f64 {
    match resource {
        RESOURCE_CPU => job.cpus as f64,
        RESOURCE_MEM => job.mem_gb as f64,
        gpu_type => job.gpu_by_type.get(gpu_type).copied().unwrap_or(0.0),
    }
}

fn percent_cell(allocation: f64, capacity: Option<f64>) -> Cell {
    match capacity {
        Some(capacity) if capacity > 0.0 => {
            Cell::Int((allocation / capacity * 100.0).round() as i64)
        }
        _ => Cell::Missing,
    }
}

/// `"typeA: 3, typeB: 1"` over the GPU types this job set actually uses, or
/// a dash when it uses none.
fn gpu_usage_string(jobs: &[&JobRecord], gpu_names: &[&str]) -> String {
    let mut used = Vec::new();
    for name in gpu_names {
        let sum: f64 = jobs.iter().map(|j| resource_value(j, name)).sum();
        let count = sum.round() as i64;
        if count > 0 {
            used.push(format!("{name}: {count}"));
        }
    }
    if used.is_empty() {
        "—".to_string()
    } else {
        used.join(", ")
    }
}

/// Median pending duration, truncated to whole seconds; the mean of the two
/// middle values for even-sized sets. `None` for an empty set.
fn median_pending<'a>(jobs: impl Iterator<Item = &'a JobRecord>) -> Option<Duration> {
    let mut durations: Vec<Duration> = jobs.map(|j| j.pending).collect();
    if durations.is_empty() {
        return None;
    }
    durations.sort();
    let mid = durations.len() / 2;
    let median = if durations.len() % 2 == 1 {
        durations[mid]
    } else {
        (durations[mid - 1] + durations[mid]) / 2
    };
    Some(Duration::from_secs(median.as_secs()))
}
