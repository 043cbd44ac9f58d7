// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `planemem plan` command: print the stride plan of every plane without
//! allocating anything.

use plane_memory::plan_strides;
use std::path::PathBuf;

pub fn execute(config: PathBuf) -> anyhow::Result<()> {
    let layout = super::load(&config)?;
    // Validates ranks the same way allocation will see them.
    layout.build_descriptor()?;

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║               planemem · Stride Plan                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Planes: {}   Dimensions: {}", layout.planes.len(), layout.dim_count);
    println!();
    println!("  {:<6} {:<24} {:<28} {:>12}", "Plane", "Extents", "Strides", "Bytes");
    println!("  {}", "-".repeat(74));

    let mut total = 0usize;
    for (p, plane) in layout.planes.iter().enumerate() {
        let plan = plan_strides(&plane.extents, plane.channel_stride)
            .map_err(|e| anyhow::anyhow!("plane {p}: {e}"))?;
        total = total.saturating_add(plan.total_bytes);
        println!(
            "  {:<6} {:<24} {:<28} {:>12}",
            p,
            format!("{:?}", plane.extents),
            format!("{:?}", plan.strides),
            plan.total_bytes,
        );
    }
    println!();
    println!("  Total host bytes: {total}");
    if let Some(budget) = layout.parse_budget()? {
        let verdict = if total <= budget.as_bytes() { "fits" } else { "EXCEEDS" };
        println!("  Host budget:      {budget} ({verdict})");
    }

    Ok(())
}
