// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Selection of jobs and nodes into analysis groups.
//!
//! Every configured criterion is ANDed: partitions, users, nodes, GPU types
//! and the two free-form predicates. A wildcard (absent or `"*"`) passes
//! everything. A free-form predicate that fails to parse or evaluate is
//! logged and treated as passing, so a broken filter widens a report
//! instead of emptying it.

use tracing::warn;

use super::capacity::aggregate_capacity;
use super::expr::{Predicate, Value};
use super::group::AnalysisGroup;
use crate::config::{Criterion, GroupDefinition};
use crate::slurm::{JobRecord, JobState, NodeRecord};

use std::collections::BTreeSet;

/// Build the (running, pending) group pair for every definition. Jobs in
/// other states are excluded from both.
pub fn build_group_pairs(
    jobs: &[JobRecord],
    nodes: &[NodeRecord],
    definitions: &[GroupDefinition],
) -> Vec<(AnalysisGroup, AnalysisGroup)> {
    let gpu_types = super::capacity::gpu_types(nodes);
    definitions
        .iter()
        .map(|definition| build_pair(jobs, nodes, &gpu_types, definition))
        .collect()
}

fn build_pair(
    jobs: &[JobRecord],
    nodes: &[NodeRecord],
    gpu_types: &BTreeSet<String>,
    definition: &GroupDefinition,
) -> (AnalysisGroup, AnalysisGroup) {
    let criteria = &definition.criteria;
    let mut queue_mask = CustomMask::compile(
        criteria.custom_queue_mask.as_deref(),
        "queue",
        &definition.name,
    );
    let mut capacity_mask = CustomMask::compile(
        criteria.custom_capacity_mask.as_deref(),
        "capacity",
        &definition.name,
    );

    let selected_jobs: Vec<&JobRecord> = jobs
        .iter()
        .filter(|job| {
            intersects(&criteria.partitions, &job.partitions)
                && contains(&criteria.users, &job.user)
                && job_uses_gpu_type(&criteria.gpu_types, job)
                && intersects(&criteria.nodes, &job.nodes)
                && queue_mask.eval(&|field| job_field(job, field, gpu_types))
        })
        .collect();

    let selected_nodes: Vec<&NodeRecord> = nodes
        .iter()
        .filter(|node| {
            intersects_set(&criteria.partitions, &node.partitions)
                && node_has_gpu_type(&criteria.gpu_types, node)
                && contains(&criteria.nodes, &node.node)
                && capacity_mask.eval(&|field| node_field(node, field, gpu_types))
        })
        .collect();

    let capacity = aggregate_capacity(selected_nodes.iter().copied(), gpu_types);

    let by_state = |state: JobState| -> Vec<JobRecord> {
        selected_jobs
            .iter()
            .filter(|job| job.state == state)
            .map(|job| (*job).clone())
            .collect()
    };

    let running = AnalysisGroup::new(
        &definition.name,
        JobState::Running,
        by_state(JobState::Running),
        capacity.clone(),
    );
    let pending = AnalysisGroup::new(
        &definition.name,
        JobState::Pending,
        by_state(JobState::Pending),
        capacity,
    );
    (running, pending)
}

fn contains(criterion: &Criterion, value: &str) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Any(values) => values.iter().any(|v| v == value),
    }
}

fn intersects(criterion: &Criterion, values: &[String]) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Any(wanted) => values.iter().any(|v| wanted.contains(v)),
    }
}

fn intersects_set(criterion: &Criterion, values: &BTreeSet<String>) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Any(wanted) => wanted.iter().any(|w| values.contains(w)),
    }
}

fn job_uses_gpu_type(criterion: &Criterion, job: &JobRecord) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Any(types) => types
            .iter()
            .any(|t| job.gpu_by_type.get(t).copied().unwrap_or(0.0) > 0.0),
    }
}

fn node_has_gpu_type(criterion: &Criterion, node: &NodeRecord) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Any(types) => types
            .iter()
            .any(|t| node.gpus.get(t).copied().unwrap_or(0) > 0),
    }
}

/// A compiled free-form mask with fail-open semantics: parse or evaluation
/// failures log one warning per group build and pass every record.
struct CustomMask {
    predicate: Option<Predicate>,
    group: String,
    binding: &'static str,
    warned: bool,
}

impl CustomMask {
    fn compile(source: Option<&str>, binding: &'static str, group: &str) -> Self {
        let mut mask = Self {
            predicate: None,
            group: group.to_string(),
            binding,
            warned: false,
        };
        let Some(source) = source.map(str::trim).filter(|s| !s.is_empty() && *s != "*") else {
            return mask;
        };
        match Predicate::parse(source, binding) {
            Ok(predicate) => mask.predicate = Some(predicate),
            Err(err) => {
                warn!(
                    group = %mask.group,
                    mask = %source,
                    error = %err,
                    "ignoring unparseable {} mask", binding
                );
            }
        }
        mask
    }

    fn eval(&mut self, field: &dyn Fn(&str) -> Option<Value>) -> bool {
        let Some(predicate) = &self.predicate else {
            return true;
        };
        match predicate.eval(field) {
            Ok(result) => result,
            Err(err) => {
                if !self.warned {
                    warn!(
                        group = %self.group,
                        error = %err,
                        "ignoring failing {} mask", self.binding
                    );
                    self.warned = true;
                }
                true
            }
        }
    }
}

/// Fields of a job record visible to `custom_queue_mask` expressions. Every
/// known GPU type is a numeric field, zero when the job does not use it.
fn job_field(job: &JobRecord, field: &str, gpu_types: &BTreeSet<String>) -> Option<Value> {
    match field {
        "jobid" => Some(Value::Str(job.job_id.clone())),
        "state" => Some(Value::Str(job.state.to_string())),
        "user" => Some(Value::Str(job.user.clone())),
        "partition" => Some(Value::Str(job.partition.clone())),
        "reason" => Some(Value::Str(job.reason.clone())),
        "cpu" => Some(Value::Num(job.cpus as f64)),
        "mem_gb" => Some(Value::Num(job.mem_gb as f64)),
        "gpu" => Some(Value::Num(job.gpus_total as f64)),
        "pending_time" => Some(Value::Num(job.pending.as_secs_f64())),
        "indeterminate_gpu" => Some(Value::Num(job.indeterminate_gpus)),
        gpu_type => job
            .gpu_by_type
            .get(gpu_type)
            .copied()
            .or_else(|| gpu_types.contains(gpu_type).then_some(0.0))
            .map(Value::Num),
    }
}

/// Fields of a node record visible to `custom_capacity_mask` expressions.
fn node_field(node: &NodeRecord, field: &str, gpu_types: &BTreeSet<String>) -> Option<Value> {
    match field {
        "node" => Some(Value::Str(node.node.clone())),
        "cpu" => Some(Value::Num(node.cpus as f64)),
        "mem_gb" => Some(Value::Num(node.mem_gb)),
        gpu_type => node
            .gpus
            .get(gpu_type)
            .map(|count| *count as f64)
            .or_else(|| gpu_types.contains(gpu_type).then_some(0.0))
            .map(Value::Num),
    }
}
