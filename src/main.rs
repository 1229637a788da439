// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use clap::Parser;

use hpcq::analysis::{attribute_gpus, build_group_pairs, capacity, CapacityIndex};
use hpcq::args::Cli;
use hpcq::{config, logging, render, slurm};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = config::load(cli.config.clone()).context("failed to load configuration")?;

    // The queue snapshot needs the capacity snapshot first: GPU attribution
    // is driven by the node and partition lookup maps.
    let nodes = slurm::fetch_capacity().context("failed to retrieve capacity data")?;
    let raw_jobs = slurm::fetch_queue().context("failed to retrieve queue data")?;

    let index = CapacityIndex::build(&nodes);
    let gpu_types = capacity::gpu_types(&nodes);
    let jobs: Vec<_> = raw_jobs
        .into_iter()
        .map(|job| attribute_gpus(job, &index, &gpu_types))
        .collect();

    let pairs = build_group_pairs(&jobs, &nodes, &config.analysis_groups);

    if cli.json {
        render::cli::print_groups_json(&pairs)
    } else if cli.cli {
        render::cli::print_groups(&pairs, !cli.no_color)
    } else {
        render::tui::run(&pairs).context("failed to run the queue viewer")
    }
}
