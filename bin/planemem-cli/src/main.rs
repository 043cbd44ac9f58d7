// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # planemem
//!
//! Command-line front end for the plane-memory allocator.
//!
//! ## Usage
//! ```bash
//! # Show strides and byte sizes for a layout
//! planemem plan --config layout.toml
//!
//! # Allocate, dump and free the layout three times
//! planemem -v cycle --config layout.toml --rounds 3
//! ```

mod commands;
mod config;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "planemem",
    about = "Plan, allocate and inspect multi-plane strided buffers",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-plane strides and sizes without allocating.
    Plan {
        /// Path to the layout TOML file.
        #[arg(short, long)]
        config: std::path::PathBuf,
    },

    /// Allocate, dump and free the layout.
    Cycle {
        /// Path to the layout TOML file.
        #[arg(short, long)]
        config: std::path::PathBuf,

        /// Number of allocate/free rounds.
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        rounds: u64,

        /// Print each dump as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Plan { config } => commands::plan::execute(config),
        Commands::Cycle {
            config,
            rounds,
            json,
        } => commands::cycle::execute(config, rounds, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_rounds_default() {
        let cli = Cli::try_parse_from(["planemem", "cycle", "--config", "l.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Cycle { rounds: 1, .. }));
    }

    #[test]
    fn test_cycle_rejects_zero_rounds() {
        let parsed = Cli::try_parse_from(["planemem", "cycle", "--config", "l.toml", "--rounds", "0"]);
        assert!(parsed.is_err());
    }
}
