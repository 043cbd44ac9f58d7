// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `planemem cycle` command: allocate, dump and free a layout repeatedly.
//!
//! Useful for checking that a layout fits its budget and that a device
//! backend hands back aliasing mappings.

use crate::config::DeviceChoice;
use std::path::PathBuf;

pub fn execute(config: PathBuf, rounds: u64, json: bool) -> anyhow::Result<()> {
    let layout = super::load(&config)?;
    let device = layout.device_choice()?;
    let ctx = layout.build_context("cli", &device)?;
    let mut desc = layout.build_descriptor()?;

    for round in 0..rounds {
        tracing::info!("round {round}: allocating {} planes", desc.plane_count());
        if let Err(e) = desc.try_allocate(&ctx) {
            tracing::error!("round {round}: {e}");
            return Err(anyhow::anyhow!("round {round}: {e}"));
        }

        let report = desc.dump_state();
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("Round {round}:");
            for plane in &report {
                println!(
                    "  plane {:<3} {:>#18x}  {:<8} extents {:?} strides {:?}",
                    plane.plane,
                    plane.host_ptr.unwrap_or(0),
                    format!("{:?}", plane.lock),
                    plane.extents,
                    plane.strides,
                );
            }
        }

        desc.free(&ctx);
        tracing::info!("round {round}: freed");
    }

    if !json {
        println!();
        println!("{}", ctx.heap().stats().summary());
        if let DeviceChoice::HostMirror(mirror) = &device {
            println!(
                "Device buffers: {} created, {} released, {} live",
                mirror.created(),
                mirror.released(),
                mirror.live_buffers(),
            );
        }
    }

    Ok(())
}
