// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`DeviceContext`] trait and a software host-mirror device.
//!
//! A device view of a plane is a buffer created over the plane's host
//! pointer ("use host pointer" semantics). The allocator only accepts a view
//! whose mapping lands back on the very same address; it never tracks two
//! independent copies of a plane.

use crate::DeviceError;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Handle to a device-side buffer.
///
/// Not `Clone`: [`DeviceContext::release_buffer`] consumes it, so a handle
/// can be released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceBuffer {
    id: u64,
    size_bytes: usize,
}

impl DeviceBuffer {
    /// Wraps a backend buffer identifier.
    pub fn new(id: u64, size_bytes: usize) -> Self {
        Self { id, size_bytes }
    }

    /// Backend identifier of this buffer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Size the buffer was created with.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

/// An accelerator context with a command queue.
///
/// Shared read-only by every descriptor that allocates through it; all
/// methods take `&self` and implementations synchronise internally.
pub trait DeviceContext: Send + Sync {
    /// Human-readable name of the device.
    fn name(&self) -> &str;

    /// Creates a read/write buffer that uses `host` directly as its storage.
    fn create_buffer(&self, host: NonNull<u8>, size_bytes: usize) -> Result<DeviceBuffer, DeviceError>;

    /// Blocking map of the whole buffer for host read/write access.
    fn map_buffer(&self, buffer: &DeviceBuffer) -> Result<NonNull<u8>, DeviceError>;

    /// Enqueues an unmap of a previous mapping.
    fn unmap_buffer(&self, buffer: &DeviceBuffer, mapped: NonNull<u8>) -> Result<(), DeviceError>;

    /// Blocks until every queued device operation has completed.
    fn finish(&self) -> Result<(), DeviceError>;

    /// Releases the buffer.
    fn release_buffer(&self, buffer: DeviceBuffer) -> Result<(), DeviceError>;
}

struct MirrorEntry {
    host: NonNull<u8>,
    size_bytes: usize,
    mapped: bool,
}

// SAFETY: the entry only records an address for identity; it is never
// dereferenced.
unsafe impl Send for MirrorEntry {}

/// A device whose buffers are the host memory itself, as on integrated or
/// CPU backends. Mapping always returns the host pointer.
///
/// # Example
/// ```
/// use plane_memory::{DeviceContext, HostHeap, HostMirrorDevice};
///
/// let heap = HostHeap::unbounded();
/// let block = heap.allocate(32).unwrap();
/// let device = HostMirrorDevice::new();
///
/// let buffer = device.create_buffer(block.as_non_null(), 32).unwrap();
/// assert_eq!(device.map_buffer(&buffer).unwrap(), block.as_non_null());
/// device.release_buffer(buffer).unwrap();
/// assert_eq!(device.live_buffers(), 0);
/// ```
pub struct HostMirrorDevice {
    name: String,
    next_id: AtomicU64,
    buffers: Mutex<HashMap<u64, MirrorEntry>>,
    created: AtomicU64,
    released: AtomicU64,
    finishes: AtomicU64,
}

impl HostMirrorDevice {
    /// Creates an empty mirror device.
    pub fn new() -> Self {
        Self::named("host-mirror")
    }

    /// Creates an empty mirror device with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
            finishes: AtomicU64::new(0),
        }
    }

    fn buffers(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u64, MirrorEntry>>, DeviceError> {
        self.buffers
            .lock()
            .map_err(|_| DeviceError::Backend("buffer table poisoned".into()))
    }

    /// Number of buffers created and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Number of live buffers currently mapped.
    pub fn mapped_buffers(&self) -> usize {
        self.buffers
            .lock()
            .map(|b| b.values().filter(|e| e.mapped).count())
            .unwrap_or(0)
    }

    /// Total bytes covered by live buffers.
    pub fn live_bytes(&self) -> usize {
        self.buffers
            .lock()
            .map(|b| b.values().map(|e| e.size_bytes).sum())
            .unwrap_or(0)
    }

    /// Total buffers ever created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Acquire)
    }

    /// Total buffers ever released.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Number of `finish` calls served.
    pub fn finishes(&self) -> u64 {
        self.finishes.load(Ordering::Acquire)
    }
}

impl Default for HostMirrorDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext for HostMirrorDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_buffer(&self, host: NonNull<u8>, size_bytes: usize) -> Result<DeviceBuffer, DeviceError> {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.buffers()?.insert(
            id,
            MirrorEntry {
                host,
                size_bytes,
                mapped: false,
            },
        );
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(DeviceBuffer::new(id, size_bytes))
    }

    fn map_buffer(&self, buffer: &DeviceBuffer) -> Result<NonNull<u8>, DeviceError> {
        let mut buffers = self.buffers()?;
        let entry = buffers
            .get_mut(&buffer.id())
            .ok_or(DeviceError::UnknownBuffer(buffer.id()))?;
        entry.mapped = true;
        Ok(entry.host)
    }

    fn unmap_buffer(&self, buffer: &DeviceBuffer, mapped: NonNull<u8>) -> Result<(), DeviceError> {
        let mut buffers = self.buffers()?;
        let entry = buffers
            .get_mut(&buffer.id())
            .ok_or(DeviceError::UnknownBuffer(buffer.id()))?;
        if entry.host != mapped {
            return Err(DeviceError::AliasMismatch {
                host: entry.host.as_ptr() as usize,
                mapped: mapped.as_ptr() as usize,
            });
        }
        entry.mapped = false;
        Ok(())
    }

    fn finish(&self) -> Result<(), DeviceError> {
        self.finishes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release_buffer(&self, buffer: DeviceBuffer) -> Result<(), DeviceError> {
        self.buffers()?
            .remove(&buffer.id())
            .ok_or(DeviceError::UnknownBuffer(buffer.id()))?;
        self.released.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl std::fmt::Debug for HostMirrorDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMirrorDevice")
            .field("name", &self.name)
            .field("live_buffers", &self.live_buffers())
            .finish()
    }
}
