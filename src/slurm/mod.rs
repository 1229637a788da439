// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Capture of scheduler state by invoking the Slurm query commands.

pub mod nodelist;
pub mod sinfo;
pub mod squeue;

use std::process::Command;

use anyhow::{bail, Context, Result};

pub use sinfo::NodeRecord;
pub use squeue::{JobRecord, JobState};

/// Snapshot node capacities via `sinfo`.
pub fn fetch_capacity() -> Result<Vec<NodeRecord>> {
    let raw = run_command("sinfo", sinfo::SINFO_ARGS)?;
    sinfo::parse_sinfo(&raw).context("failed to parse sinfo output")
}

/// Snapshot the job queue via `squeue`. Slurm spreads the fields of interest
/// over two format options, so the command runs twice.
pub fn fetch_queue() -> Result<Vec<JobRecord>> {
    let long = run_command("squeue", squeue::SQUEUE_LONG_ARGS)?;
    let short = run_command("squeue", squeue::SQUEUE_SHORT_ARGS)?;
    squeue::parse_queue(&long, &short).context("failed to parse squeue output")
}

fn run_command(program: &str, args: &[&str]) -> Result<String> {
    tracing::debug!(program, ?args, "running scheduler command");
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {program}"))?;
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    String::from_utf8(output.stdout).with_context(|| format!("{program} produced non-utf8 output"))
}
