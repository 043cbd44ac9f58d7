// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host heap statistics for diagnostics.
//!
//! [`AllocationStats`] tracks what a [`HostHeap`](crate::HostHeap) has handed
//! out: how many plane allocations succeeded or failed, how many bytes are
//! live, and the high-water mark.

/// Cumulative statistics about host heap usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Total number of allocation requests, failed ones included.
    pub total_allocations: u64,
    /// Requests that failed (budget exhausted or allocator returned null).
    pub failed_allocations: u64,
    /// Number of blocks returned to the heap.
    pub total_deallocations: u64,
    /// Bytes currently held by live blocks.
    pub live_bytes: usize,
    /// Peak of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Total bytes ever handed out.
    pub cumulative_bytes: u64,
}

impl AllocationStats {
    /// Number of blocks currently outstanding.
    pub fn live_blocks(&self) -> u64 {
        (self.total_allocations - self.failed_allocations).saturating_sub(self.total_deallocations)
    }

    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cumulative_bytes += size as u64;
        self.live_bytes += size;
        if self.live_bytes > self.peak_live_bytes {
            self.peak_live_bytes = self.live_bytes;
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.total_allocations += 1;
        self.failed_allocations += 1;
    }

    pub(crate) fn record_deallocation(&mut self, size: usize) {
        self.total_deallocations += 1;
        self.live_bytes = self.live_bytes.saturating_sub(size);
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Host blocks: {} requested ({} failed), {} freed, {} live bytes, peak {} bytes",
            self.total_allocations,
            self.failed_allocations,
            self.total_deallocations,
            self.live_bytes,
            self.peak_live_bytes,
        )
    }
}
