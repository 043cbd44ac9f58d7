// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for plane allocation.

/// Errors that can occur while acquiring or releasing plane memory.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The requested allocation would exceed the host memory budget.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// The system allocator returned no memory.
    #[error("host allocation of {size_bytes} bytes failed")]
    HostAllocationFailed { size_bytes: usize },

    /// Stride or size arithmetic overflowed for a plane.
    #[error("layout overflow in plane {plane} at dimension {dim}")]
    LayoutOverflow { plane: usize, dim: usize },

    /// The descriptor or its configuration is malformed.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// The device context rejected a request.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Errors reported by a [`DeviceContext`](crate::DeviceContext).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The device could not create a buffer over the host pointer.
    #[error("device buffer creation failed for {size_bytes} bytes: {reason}")]
    CreateFailed { size_bytes: usize, reason: String },

    /// Mapping the device buffer back into host space failed.
    #[error("device buffer mapping failed: {reason}")]
    MapFailed { reason: String },

    /// The mapping succeeded but does not alias the host allocation.
    #[error("device mapping {mapped:#x} does not alias host pointer {host:#x}")]
    AliasMismatch { host: usize, mapped: usize },

    /// The buffer handle is not known to this device.
    #[error("unknown device buffer #{0}")]
    UnknownBuffer(u64),

    /// Any other backend failure.
    #[error("device backend: {0}")]
    Backend(String),
}

/// A failed allocation attempt, naming the first plane that could not be
/// acquired. The descriptor is fully quiesced when this is returned.
#[derive(Debug, thiserror::Error)]
#[error("allocation failed at plane {plane}: {source}")]
pub struct AllocationError {
    /// Index of the plane whose acquisition failed.
    pub plane: usize,
    /// Why it failed.
    #[source]
    pub source: MemoryError,
}
