// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print summary tables to stdout instead of launching the TUI.
    #[arg(long)]
    pub cli: bool,

    /// Emit every table of every analysis group as JSON (implies --cli).
    #[arg(long)]
    pub json: bool,

    /// Path to the analysis-group configuration file.
    /// Defaults to ./hpcq.yaml, then the per-user config directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable colored output in CLI mode.
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging (HPCQ_LOG overrides).
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_launch_the_tui() {
        let cli = Cli::parse_from(["hpcq"]);
        assert!(!cli.cli);
        assert!(!cli.json);
        assert!(cli.config.is_none());
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from(["hpcq", "--cli", "--json", "--config", "groups.yaml", "-v"]);
        assert!(cli.cli);
        assert!(cli.json);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("groups.yaml")));
        assert!(cli.verbose);
    }
}
