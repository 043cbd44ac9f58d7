// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations.

pub mod cycle;
pub mod plan;

use crate::config::LayoutConfig;
use std::path::Path;

/// Installs the global tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub(crate) fn load(config: &Path) -> anyhow::Result<LayoutConfig> {
    let layout = LayoutConfig::from_file(config)
        .map_err(|e| anyhow::anyhow!("failed to load layout from '{}': {e}", config.display()))?;
    tracing::info!(
        "loaded layout '{}': {} planes, {} dimensions, device {}",
        config.display(),
        layout.planes.len(),
        layout.dim_count,
        layout.device
    );
    Ok(layout)
}
