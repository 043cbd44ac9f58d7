// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # plane-memory
//!
//! Allocation core for multi-plane, multi-dimensional strided buffers
//! (image planes, tensor channel groups) shared between the host and an
//! optional accelerator device.
//!
//! # Key Components
//!
//! - [`BufferDescriptor`]: declares planes and their extents, and owns their
//!   storage once allocated.
//! - [`plan_strides`]: derives byte strides from extents and an optional
//!   declared channel size.
//! - [`BufferDescriptor::try_allocate`] / [`allocate_memory`]: all-or-nothing
//!   allocation with rollback on the first failing plane.
//! - [`BufferDescriptor::free`] / [`free_memory`]: idempotent teardown.
//! - [`BufferDescriptor::dump_state`]: per-plane diagnostics.
//! - [`MemoryContext`]: the host heap, optional [`DeviceContext`] and
//!   diagnostics span allocation runs against.
//!
//! # Ownership Model
//!
//! ```text
//! BufferDescriptor
//!   └── slots[p]: Empty | Allocated { HostBlock, Option<DeviceBuffer>, PlaneLock }
//!                              │              │                  │
//!                 drop → dealloc + budget   release_buffer     drop = destroy
//! ```
//!
//! A plane's lock exists exactly while its host memory does. The descriptor
//! is either fully allocated or holds nothing.
//!
//! # Example
//! ```
//! use plane_memory::{allocate_memory, free_memory, BufferDescriptor, MemoryContext};
//!
//! let ctx = MemoryContext::new();
//! let mut yuv = BufferDescriptor::from_planes(2, [vec![8, 4], vec![4, 2], vec![4, 2]]).unwrap();
//!
//! assert!(allocate_memory(&mut yuv, &ctx));
//! assert_eq!(yuv.plane_byte_size(1), Some(8));
//! {
//!     let _guard = yuv.plane_lock(0).unwrap().lock();
//!     // exclusive access to plane 0
//! }
//! assert!(!free_memory(&mut yuv, &ctx));
//! ```

mod allocator;
mod block;
mod budget;
mod context;
mod deallocator;
mod descriptor;
mod device;
mod error;
mod heap;
mod introspect;
mod lock;
mod stats;
pub mod stride;

pub use allocator::allocate_memory;
pub use block::HostBlock;
pub use budget::MemoryBudget;
pub use context::{MemoryContext, MemoryContextBuilder};
pub use deallocator::free_memory;
pub use descriptor::BufferDescriptor;
pub use device::{DeviceBuffer, DeviceContext, HostMirrorDevice};
pub use error::{AllocationError, DeviceError, MemoryError};
pub use heap::{HostHeap, HOST_ALIGNMENT};
pub use introspect::{LockState, PlaneReport};
pub use lock::{PlaneGuard, PlaneLock};
pub use stats::AllocationStats;
pub use stride::{plan_strides, StridePlan};
