// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Attribution of a job's aggregate GPU allocation to concrete GPU types.

use std::collections::BTreeSet;

use super::capacity::CapacityIndex;
use crate::slurm::JobRecord;

/// Distribute a job's GPU total across GPU types, most trustworthy source
/// first:
///
/// 1. assigned nodes whose GPU type is unambiguous, at GPUs-per-node each;
/// 2. the job's own declared GPU type, for whatever is still unassigned;
/// 3. the partition's unambiguous GPU type;
/// 4. otherwise the remainder is recorded as indeterminate.
///
/// The per-type counts and the indeterminate counter always sum to the
/// job's GPU total. Jobs without GPUs pass through with all counts at zero.
pub fn attribute_gpus(
    mut job: JobRecord,
    index: &CapacityIndex,
    gpu_types: &BTreeSet<String>,
) -> JobRecord {
    for gpu_type in gpu_types {
        job.gpu_by_type.entry(gpu_type.clone()).or_insert(0.0);
    }
    if job.gpus_total == 0 {
        return job;
    }

    let mut assigned = 0.0;
    for node in &job.nodes {
        if let Some(gpu_type) = index.node_gpu.get(node) {
            if let Some(count) = job.gpu_by_type.get_mut(gpu_type) {
                *count += job.gpus_per_node;
                assigned += job.gpus_per_node;
            }
        }
    }

    let remaining = job.gpus_total as f64 - assigned;
    if remaining <= 0.0 {
        return job;
    }

    if let Some(hint) = job.gpu_type_hint.clone() {
        if let Some(count) = job.gpu_by_type.get_mut(&hint) {
            *count += remaining;
            return job;
        }
    }

    if let Some(gpu_type) = index.partition_gpu.get(&job.partition) {
        if let Some(count) = job.gpu_by_type.get_mut(gpu_type) {
            *count += remaining;
            return job;
        }
    }

    job.indeterminate_gpus += remaining;
    job
}
