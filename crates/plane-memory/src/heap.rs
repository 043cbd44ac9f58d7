// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host heap with optional budget enforcement.
//!
//! The [`HostHeap`] is where plane storage comes from. It:
//!
//! 1. Hands out uninitialised, 64-byte aligned [`HostBlock`]s.
//! 2. Optionally enforces a hard [`MemoryBudget`]; a request that would
//!    exceed it fails with `OutOfMemory` instead of reaching the allocator.
//! 3. Tracks [`AllocationStats`] for diagnostics.
//!
//! # Thread Safety
//! `HostHeap` is `Send + Sync` and cheap to clone; clones share one budget.

use crate::{AllocationStats, HostBlock, MemoryBudget, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Alignment of every host block, in bytes.
pub const HOST_ALIGNMENT: usize = 64;

/// Heap state shared between the heap handle and its outstanding blocks.
pub(crate) struct HeapInner {
    budget: Option<MemoryBudget>,
    live_bytes: AtomicUsize,
    stats: Mutex<AllocationStats>,
}

impl HeapInner {
    /// Called by `HostBlock::drop` once its memory has been released.
    pub(crate) fn return_block(&self, size_bytes: usize) {
        self.live_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_deallocation(size_bytes);
        }
    }

    fn record_failure(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_failure();
        }
    }
}

/// The host-allocation collaborator used by the allocator.
///
/// # Example
/// ```
/// use plane_memory::{HostHeap, MemoryBudget};
///
/// let heap = HostHeap::with_budget(MemoryBudget::from_bytes(100));
/// let block = heap.allocate(60).unwrap();
/// assert!(heap.allocate(60).is_err());
/// drop(block);
/// assert!(heap.allocate(60).is_ok());
/// ```
#[derive(Clone)]
pub struct HostHeap {
    inner: Arc<HeapInner>,
}

impl HostHeap {
    /// Creates a heap limited only by the system allocator.
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// Creates a heap that refuses to exceed `budget` live bytes.
    pub fn with_budget(budget: MemoryBudget) -> Self {
        Self::build(Some(budget))
    }

    fn build(budget: Option<MemoryBudget>) -> Self {
        Self {
            inner: Arc::new(HeapInner {
                budget,
                live_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Allocates an uninitialised block of `size_bytes`.
    ///
    /// The budget is reserved before the allocator is called and given back
    /// if the allocator fails, so concurrent callers never overshoot it.
    pub fn allocate(&self, size_bytes: usize) -> Result<HostBlock, MemoryError> {
        if let Some(budget) = self.inner.budget {
            let limit = budget.as_bytes();
            let reserved = self
                .inner
                .live_bytes
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    current.checked_add(size_bytes).filter(|&total| total <= limit)
                });
            if let Err(current) = reserved {
                self.inner.record_failure();
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes: limit.saturating_sub(current),
                    budget_bytes: limit,
                });
            }
        } else {
            self.inner.live_bytes.fetch_add(size_bytes, Ordering::AcqRel);
        }

        match HostBlock::allocate(size_bytes, Arc::clone(&self.inner)) {
            Some(block) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_allocation(size_bytes);
                }
                Ok(block)
            }
            None => {
                self.inner.live_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
                self.inner.record_failure();
                Err(MemoryError::HostAllocationFailed { size_bytes })
            }
        }
    }

    /// Returns the number of bytes held by live blocks.
    pub fn live_bytes(&self) -> usize {
        self.inner.live_bytes.load(Ordering::Acquire)
    }

    /// Returns the budget, if one is enforced.
    pub fn budget(&self) -> Option<MemoryBudget> {
        self.inner.budget
    }

    /// Returns the bytes left before the budget, or `None` when unbounded.
    pub fn available_bytes(&self) -> Option<usize> {
        self.inner
            .budget
            .map(|b| b.as_bytes().saturating_sub(self.live_bytes()))
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Default for HostHeap {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for HostHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostHeap")
            .field("budget", &self.inner.budget)
            .field("live_bytes", &self.live_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_drop() {
        let heap = HostHeap::unbounded();
        let block = heap.allocate(1024).unwrap();
        assert_eq!(heap.live_bytes(), 1024);
        assert_eq!(block.len(), 1024);
        drop(block);
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn test_budget_exhaustion() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(1024));
        let _a = heap.allocate(512).unwrap();
        let _b = heap.allocate(512).unwrap();
        match heap.allocate(1) {
            Err(MemoryError::OutOfMemory {
                requested_bytes,
                available_bytes,
                budget_bytes,
            }) => {
                assert_eq!(requested_bytes, 1);
                assert_eq!(available_bytes, 0);
                assert_eq!(budget_bytes, 1024);
            }
            other => panic!("expected OutOfMemory, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_byte_budget_admits_empty_blocks() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(0));
        assert!(heap.allocate(0).is_ok());
        assert!(heap.allocate(1).is_err());
    }

    #[test]
    fn test_available_bytes() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(10_000));
        assert_eq!(heap.available_bytes(), Some(10_000));
        let _g = heap.allocate(3000).unwrap();
        assert_eq!(heap.available_bytes(), Some(7000));
        assert_eq!(HostHeap::unbounded().available_bytes(), None);
    }

    #[test]
    fn test_unrepresentable_size_fails() {
        let heap = HostHeap::unbounded();
        let result = heap.allocate(usize::MAX);
        assert!(matches!(result, Err(MemoryError::HostAllocationFailed { .. })));
        assert_eq!(heap.live_bytes(), 0);
    }

    #[test]
    fn test_stats() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(100));
        let a = heap.allocate(60).unwrap();
        let _ = heap.allocate(60);
        drop(a);
        let stats = heap.stats();
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.failed_allocations, 1);
        assert_eq!(stats.total_deallocations, 1);
        assert_eq!(stats.peak_live_bytes, 60);
        assert_eq!(stats.live_bytes, 0);
    }

    #[test]
    fn test_clones_share_budget() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(64));
        let other = heap.clone();
        let _a = heap.allocate(64).unwrap();
        assert!(other.allocate(1).is_err());
    }

    #[test]
    fn test_debug_format() {
        let heap = HostHeap::with_budget(MemoryBudget::from_mb(1));
        let debug = format!("{heap:?}");
        assert!(debug.contains("HostHeap"));
        assert!(debug.contains("budget"));
    }
}
