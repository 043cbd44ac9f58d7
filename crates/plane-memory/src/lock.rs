// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-plane exclusive-access lock.
//!
//! A [`PlaneLock`] is a counting semaphore; planes always create it with a
//! count of one, which makes it a binary lock. Consumers of a plane acquire
//! it around reads and writes of the plane's contents. The allocator itself
//! only creates it, probes it for diagnostics and destroys it (by drop).

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore guarding one plane.
#[derive(Debug)]
pub struct PlaneLock {
    count: Mutex<u32>,
    capacity: u32,
    available: Condvar,
}

impl PlaneLock {
    /// Creates a semaphore with `initial` permits.
    pub fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
            capacity: initial,
            available: Condvar::new(),
        }
    }

    /// Creates a binary (exclusive) lock, initially free.
    pub fn exclusive() -> Self {
        Self::new(1)
    }

    fn permits(&self) -> MutexGuard<'_, u32> {
        // The counter is a plain integer; a panicking holder cannot leave it
        // torn, so poisoning is ignored.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a permit without blocking. Returns `false` if none is free.
    pub fn try_acquire(&self) -> bool {
        let mut count = self.permits();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// Takes a permit, blocking until one is free.
    pub fn acquire(&self) {
        let mut count = self.permits();
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Returns a permit and wakes one waiter.
    ///
    /// A release with no permit outstanding is ignored, so the count never
    /// exceeds the initial one.
    pub fn release(&self) {
        let mut count = self.permits();
        if *count >= self.capacity {
            tracing::warn!("plane lock released with no permit held; ignored");
            return;
        }
        *count += 1;
        drop(count);
        self.available.notify_one();
    }

    /// Number of free permits at this instant.
    pub fn permits_available(&self) -> u32 {
        *self.permits()
    }

    /// Probes whether the lock is free with a trial acquire that is undone
    /// immediately. Holders are never disturbed; a concurrent acquirer may
    /// briefly see the lock taken.
    pub fn is_free(&self) -> bool {
        let free = self.try_acquire();
        if free {
            self.release();
        }
        free
    }

    /// Acquires without blocking, returning a guard that releases on drop.
    pub fn try_lock(&self) -> Option<PlaneGuard<'_>> {
        self.try_acquire().then(|| PlaneGuard { lock: self })
    }

    /// Acquires, blocking, returning a guard that releases on drop.
    pub fn lock(&self) -> PlaneGuard<'_> {
        self.acquire();
        PlaneGuard { lock: self }
    }
}

/// Holds one permit of a [`PlaneLock`] until dropped.
#[derive(Debug)]
#[must_use = "the plane is unlocked as soon as the guard is dropped"]
pub struct PlaneGuard<'a> {
    lock: &'a PlaneLock,
}

impl Drop for PlaneGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
