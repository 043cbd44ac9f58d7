// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! All-or-nothing allocation of a descriptor's planes.
//!
//! Planes are acquired in index order. Each acquired plane is staged together
//! with what it takes to undo it; the first failure unwinds the stage in
//! reverse order and the descriptor is left exactly as it was.
//!
//! ```text
//! for p in planes:
//!     plan strides ─► host block ─► [device buffer ─► map == host?] ─► stage
//!                                                       │ fail
//!                                                       ▼
//!                        unwind stage (unmap, finish, release, free host)
//! commit: create one exclusive lock per staged plane
//! ```

use crate::descriptor::{PlaneMemory, PlaneSlot};
use crate::stride::{plan_strides, CHANNEL_DIM};
use crate::{
    AllocationError, BufferDescriptor, DeviceBuffer, DeviceContext, DeviceError, HostBlock,
    MemoryContext, MemoryError, PlaneLock,
};
use std::ptr::NonNull;

/// A device buffer together with the mapping that validated it.
struct DeviceView {
    buffer: DeviceBuffer,
    mapped: NonNull<u8>,
}

/// A plane whose memory is acquired but not yet committed.
struct StagedPlane {
    host: HostBlock,
    view: Option<DeviceView>,
}

impl BufferDescriptor {
    /// Allocates every plane, or none.
    ///
    /// Already-allocated descriptors are left untouched. On failure every
    /// plane acquired during this call is released again, and the error
    /// names the plane that could not be acquired.
    pub fn try_allocate(&mut self, ctx: &MemoryContext) -> Result<(), AllocationError> {
        if self.allocated {
            return Ok(());
        }
        let _span = ctx.span().enter();
        tracing::info!(
            "allocating {} planes of {} dimensions each",
            self.plane_count(),
            self.dim_count
        );

        let mut staged: Vec<StagedPlane> = Vec::with_capacity(self.plane_count());
        for plane in 0..self.plane_count() {
            match self.acquire_plane(plane, ctx) {
                Ok(stage) => staged.push(stage),
                Err(source) => {
                    tracing::error!("plane {plane}: allocation failed: {source}");
                    unwind(staged, ctx.device());
                    self.dump_state();
                    return Err(AllocationError { plane, source });
                }
            }
        }

        for (slot, stage) in self.slots.iter_mut().zip(staged) {
            *slot = PlaneSlot::Allocated(PlaneMemory {
                host: stage.host,
                device: stage.view.map(|v| v.buffer),
                lock: PlaneLock::exclusive(),
            });
        }
        self.allocated = true;
        self.dump_state();
        Ok(())
    }

    /// Allocates every plane, or none, reporting only the outcome.
    ///
    /// Returns the resulting allocation state. Failures are traced at error
    /// level; use [`try_allocate`](Self::try_allocate) to inspect them.
    pub fn allocate(&mut self, ctx: &MemoryContext) -> bool {
        self.try_allocate(ctx).is_ok()
    }

    /// Plans plane `plane`'s strides and acquires its host memory and, when a
    /// device is active, its aliased device view.
    fn acquire_plane(&mut self, plane: usize, ctx: &MemoryContext) -> Result<StagedPlane, MemoryError> {
        let layout = &mut self.layouts[plane];
        let channel_stride = layout.strides.get(CHANNEL_DIM).copied().unwrap_or(0);
        let plan = plan_strides(&layout.extents, channel_stride)
            .map_err(|e| MemoryError::LayoutOverflow { plane, dim: e.dim })?;
        layout.strides = plan.strides;
        let size = plan.total_bytes;
        tracing::debug!(
            "plane {plane}: extents {:?} strides {:?} -> {size} bytes",
            layout.extents,
            layout.strides
        );

        let host = ctx.heap().allocate(size)?;
        let view = match ctx.device() {
            Some(device) => Some(attach_device_view(device, &host, size)?),
            None => None,
        };
        tracing::info!("plane {plane}: allocated {:p} for {size} bytes", host.as_ptr());
        Ok(StagedPlane { host, view })
    }
}

/// Creates a device buffer over `host` and checks that mapping it lands on
/// the same address. A relocated or failed mapping is torn down again; the
/// caller still owns `host` and drops it after this returns.
fn attach_device_view(
    device: &dyn DeviceContext,
    host: &HostBlock,
    size: usize,
) -> Result<DeviceView, MemoryError> {
    let buffer = device.create_buffer(host.as_non_null(), size)?;
    tracing::debug!(
        "{}: created buffer #{} over {:p} ({size} bytes)",
        device.name(),
        buffer.id(),
        host.as_ptr()
    );

    match device.map_buffer(&buffer) {
        Ok(mapped) if mapped == host.as_non_null() => Ok(DeviceView { buffer, mapped }),
        Ok(mapped) => {
            tracing::debug!(
                "{}: buffer #{} mapped at {:p}, host is {:p}",
                device.name(),
                buffer.id(),
                mapped.as_ptr(),
                host.as_ptr()
            );
            if let Err(e) = device.unmap_buffer(&buffer, mapped) {
                tracing::warn!("{}: unmap of buffer #{} failed: {e}", device.name(), buffer.id());
            }
            release_buffer(device, buffer);
            Err(DeviceError::AliasMismatch {
                host: host.as_ptr() as usize,
                mapped: mapped.as_ptr() as usize,
            }
            .into())
        }
        Err(e) => {
            release_buffer(device, buffer);
            Err(e.into())
        }
    }
}

/// Releases staged planes in reverse order of acquisition. Device views are
/// unmapped and drained before release, then the host block is freed.
fn unwind(staged: Vec<StagedPlane>, device: Option<&dyn DeviceContext>) {
    for (plane, stage) in staged.into_iter().enumerate().rev() {
        if let Some(DeviceView { buffer, mapped }) = stage.view {
            match device {
                Some(device) => {
                    if let Err(e) = device.unmap_buffer(&buffer, mapped) {
                        tracing::warn!("plane {plane}: unmap of buffer #{} failed: {e}", buffer.id());
                    }
                    if let Err(e) = device.finish() {
                        tracing::warn!("plane {plane}: device finish failed: {e}");
                    }
                    release_buffer(device, buffer);
                }
                None => tracing::warn!("plane {plane}: no device to release buffer #{}", buffer.id()),
            }
        }
        tracing::info!("plane {plane}: freeing {:p}", stage.host.as_ptr());
        drop(stage.host);
    }
}

pub(crate) fn release_buffer(device: &dyn DeviceContext, buffer: DeviceBuffer) {
    let id = buffer.id();
    match device.release_buffer(buffer) {
        Ok(()) => tracing::debug!("{}: released buffer #{id}", device.name()),
        Err(e) => tracing::warn!("{}: release of buffer #{id} failed: {e}", device.name()),
    }
}

/// Allocates `descriptor` against `ctx`, returning the resulting allocation
/// state. A `false` result always leaves the descriptor holding nothing.
pub fn allocate_memory(descriptor: &mut BufferDescriptor, ctx: &MemoryContext) -> bool {
    descriptor.allocate(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HostMirrorDevice, MemoryBudget};
    use std::sync::Arc;

    fn image(planes: usize) -> BufferDescriptor {
        BufferDescriptor::from_planes(2, (0..planes).map(|_| vec![4, 3])).unwrap()
    }

    #[test]
    fn test_single_plane() {
        let ctx = MemoryContext::new();
        let mut desc = image(1);
        assert!(allocate_memory(&mut desc, &ctx));
        assert!(desc.is_allocated());
        assert_eq!(desc.strides(0), Some(&[1, 4][..]));
        assert_eq!(desc.host_block(0).map(|b| b.len()), Some(12));
        assert!(desc.plane_lock(0).unwrap().is_free());
        assert_eq!(ctx.heap().live_bytes(), 12);
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let ctx = MemoryContext::new();
        let mut desc = image(2);
        desc.try_allocate(&ctx).unwrap();
        let first = desc.host_ptr(0);
        desc.try_allocate(&ctx).unwrap();
        assert!(desc.allocate(&ctx));
        assert_eq!(desc.host_ptr(0), first);
        assert_eq!(ctx.heap().stats().total_allocations, 2);
    }

    #[test]
    fn test_budget_failure_rolls_back() {
        let ctx = MemoryContext::builder()
            .budget(MemoryBudget::from_bytes(20))
            .build();
        let mut desc = image(2);

        let err = desc.try_allocate(&ctx).unwrap_err();
        assert_eq!(err.plane, 1);
        assert!(matches!(err.source, MemoryError::OutOfMemory { .. }));
        assert!(!desc.is_allocated());
        assert!(desc.host_ptr(0).is_none());
        assert!(desc.plane_lock(0).is_none());
        assert_eq!(ctx.heap().live_bytes(), 0);
    }

    #[test]
    fn test_overflow_is_an_allocation_failure() {
        let ctx = MemoryContext::new();
        let mut desc = BufferDescriptor::from_planes(2, [vec![4, 3], vec![usize::MAX, 2]]).unwrap();
        let err = desc.try_allocate(&ctx).unwrap_err();
        assert_eq!(err.plane, 1);
        assert!(matches!(err.source, MemoryError::LayoutOverflow { plane: 1, dim: 1 }));
        assert_eq!(ctx.heap().live_bytes(), 0);
    }

    #[test]
    fn test_device_views_alias_host() {
        let device = Arc::new(HostMirrorDevice::new());
        let ctx = MemoryContext::builder().device(device.clone()).build();
        let mut desc = image(3);

        desc.try_allocate(&ctx).unwrap();
        assert_eq!(device.live_buffers(), 3);
        for p in 0..3 {
            let buffer = desc.device_buffer(p).unwrap();
            assert_eq!(buffer.size_bytes(), 12);
        }
        assert!(!desc.free(&ctx));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_rollback_releases_device_views() {
        let device = Arc::new(HostMirrorDevice::new());
        let ctx = MemoryContext::builder()
            .device(device.clone())
            .budget(MemoryBudget::from_bytes(30))
            .build();
        let mut desc = image(3);

        assert!(!desc.allocate(&ctx));
        assert_eq!(device.created(), 2);
        assert_eq!(device.released(), 2);
        assert_eq!(device.finishes(), 2);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(ctx.heap().live_bytes(), 0);
    }

    #[test]
    fn test_empty_descriptor_allocates() {
        let ctx = MemoryContext::new();
        let mut desc = BufferDescriptor::new(3);
        assert!(desc.allocate(&ctx));
    }
}
