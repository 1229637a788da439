// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::env;

use tracing_subscriber::EnvFilter;

/// Initialize compact logging to stderr, so tables on stdout stay clean.
/// `HPCQ_LOG` takes precedence over the verbosity flag.
pub fn init(verbose: bool) {
    let filter = match env::var("HPCQ_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }
    };

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
