// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The multi-plane buffer descriptor.
//!
//! A [`BufferDescriptor`] declares `plane_count` planes of `dim_count`
//! dimensions each and, once allocated, owns every plane's storage. Each
//! plane's resources live in a tagged slot:
//!
//! ```text
//! PlaneSlot::Empty
//! PlaneSlot::Allocated { host: HostBlock, device: Option<DeviceBuffer>, lock: PlaneLock }
//! ```
//!
//! so a lock exists exactly when host memory does, and dropping the slot
//! releases both.

use crate::stride::CHANNEL_DIM;
use crate::{DeviceBuffer, HostBlock, MemoryError, PlaneLock};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

/// Extents and strides of one plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaneLayout {
    pub(crate) extents: Vec<usize>,
    pub(crate) strides: Vec<isize>,
}

/// Resources held by an allocated plane.
#[derive(Debug)]
pub(crate) struct PlaneMemory {
    pub(crate) host: HostBlock,
    pub(crate) device: Option<DeviceBuffer>,
    pub(crate) lock: PlaneLock,
}

#[derive(Debug, Default)]
pub(crate) enum PlaneSlot {
    #[default]
    Empty,
    Allocated(PlaneMemory),
}

impl PlaneSlot {
    pub(crate) fn memory(&self) -> Option<&PlaneMemory> {
        match self {
            PlaneSlot::Allocated(memory) => Some(memory),
            PlaneSlot::Empty => None,
        }
    }

    pub(crate) fn memory_mut(&mut self) -> Option<&mut PlaneMemory> {
        match self {
            PlaneSlot::Allocated(memory) => Some(memory),
            PlaneSlot::Empty => None,
        }
    }
}

/// A multi-plane, multi-dimensional strided buffer.
///
/// # Example
/// ```
/// use plane_memory::{BufferDescriptor, MemoryContext};
///
/// // One 4x3 plane of single-byte elements.
/// let mut desc = BufferDescriptor::from_planes(2, [vec![4, 3]]).unwrap();
/// let ctx = MemoryContext::new();
///
/// desc.try_allocate(&ctx).unwrap();
/// assert_eq!(desc.strides(0), Some(&[1, 4][..]));
/// assert_eq!(desc.plane_byte_size(0), Some(12));
/// assert!(desc.plane_lock(0).unwrap().is_free());
///
/// assert!(!desc.free(&ctx));
/// assert!(desc.host_ptr(0).is_none());
/// ```
#[derive(Debug)]
pub struct BufferDescriptor {
    pub(crate) dim_count: usize,
    pub(crate) layouts: Vec<PlaneLayout>,
    pub(crate) slots: Vec<PlaneSlot>,
    pub(crate) allocated: bool,
}

impl BufferDescriptor {
    /// Creates a descriptor with no planes.
    pub fn new(dim_count: usize) -> Self {
        Self {
            dim_count,
            layouts: Vec::new(),
            slots: Vec::new(),
            allocated: false,
        }
    }

    /// Creates a descriptor from per-plane extents.
    pub fn from_planes<I>(dim_count: usize, planes: I) -> Result<Self, MemoryError>
    where
        I: IntoIterator<Item = Vec<usize>>,
    {
        let mut desc = Self::new(dim_count);
        for extents in planes {
            desc.add_plane(extents)?;
        }
        Ok(desc)
    }

    /// Appends a plane and returns its index. Strides start at zero, so the
    /// channel dimension uses the default one-byte element until seeded.
    pub fn add_plane(&mut self, extents: Vec<usize>) -> Result<usize, MemoryError> {
        self.ensure_unallocated()?;
        if extents.len() != self.dim_count {
            return Err(MemoryError::InvalidLayout(format!(
                "plane has {} extents, descriptor has {} dimensions",
                extents.len(),
                self.dim_count
            )));
        }
        self.layouts.push(PlaneLayout {
            strides: vec![0; extents.len()],
            extents,
        });
        self.slots.push(PlaneSlot::Empty);
        Ok(self.layouts.len() - 1)
    }

    /// Sets one extent of an unallocated plane.
    pub fn set_extent(&mut self, plane: usize, dim: usize, extent: usize) -> Result<(), MemoryError> {
        self.ensure_unallocated()?;
        let slot = self
            .layouts
            .get_mut(plane)
            .and_then(|l| l.extents.get_mut(dim))
            .ok_or_else(|| MemoryError::InvalidLayout(format!("no dimension {dim} in plane {plane}")))?;
        *slot = extent;
        Ok(())
    }

    /// Declares the element size of a plane by seeding its channel stride.
    /// Zero restores the one-byte default.
    pub fn set_channel_stride(&mut self, plane: usize, stride: isize) -> Result<(), MemoryError> {
        self.ensure_unallocated()?;
        let slot = self
            .layouts
            .get_mut(plane)
            .and_then(|l| l.strides.get_mut(CHANNEL_DIM))
            .ok_or_else(|| {
                MemoryError::InvalidLayout(format!("plane {plane} has no channel dimension"))
            })?;
        *slot = stride;
        Ok(())
    }

    fn ensure_unallocated(&self) -> Result<(), MemoryError> {
        if self.allocated {
            return Err(MemoryError::InvalidLayout(
                "layout cannot change while the descriptor is allocated".into(),
            ));
        }
        Ok(())
    }

    /// Number of planes.
    pub fn plane_count(&self) -> usize {
        self.layouts.len()
    }

    /// Number of dimensions of every plane.
    pub fn dim_count(&self) -> usize {
        self.dim_count
    }

    /// Returns `true` once every plane holds memory and a lock.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Extents of `plane`.
    pub fn extents(&self, plane: usize) -> Option<&[usize]> {
        self.layouts.get(plane).map(|l| l.extents.as_slice())
    }

    /// Byte strides of `plane`; derived ones are only meaningful after
    /// allocation has planned them.
    pub fn strides(&self, plane: usize) -> Option<&[isize]> {
        self.layouts.get(plane).map(|l| l.strides.as_slice())
    }

    /// Host address of an allocated plane.
    pub fn host_ptr(&self, plane: usize) -> Option<NonNull<u8>> {
        self.memory(plane).map(|m| m.host.as_non_null())
    }

    /// Host storage of an allocated plane.
    pub fn host_block(&self, plane: usize) -> Option<&HostBlock> {
        self.memory(plane).map(|m| &m.host)
    }

    /// Bytes of an allocated plane. Contents are uninitialised until written.
    pub fn plane_slice(&self, plane: usize) -> Option<&[MaybeUninit<u8>]> {
        self.memory(plane).map(|m| m.host.as_uninit())
    }

    /// Writable bytes of an allocated plane.
    ///
    /// Only the contents are exposed; the storage itself, and with it the
    /// device view aliasing it, stays fixed until `free`.
    pub fn plane_slice_mut(&mut self, plane: usize) -> Option<&mut [MaybeUninit<u8>]> {
        self.slots
            .get_mut(plane)
            .and_then(PlaneSlot::memory_mut)
            .map(|m| m.host.as_uninit_mut())
    }

    /// Device view of an allocated plane, when a device context was active.
    pub fn device_buffer(&self, plane: usize) -> Option<&DeviceBuffer> {
        self.memory(plane).and_then(|m| m.device.as_ref())
    }

    /// Exclusive-access lock of an allocated plane.
    pub fn plane_lock(&self, plane: usize) -> Option<&PlaneLock> {
        self.memory(plane).map(|m| &m.lock)
    }

    pub(crate) fn memory(&self, plane: usize) -> Option<&PlaneMemory> {
        self.slots.get(plane).and_then(PlaneSlot::memory)
    }
}

impl Drop for BufferDescriptor {
    fn drop(&mut self) {
        // Host blocks and locks release themselves; device buffers need the
        // context that `free` is given.
        for (plane, slot) in self.slots.iter().enumerate() {
            if let Some(buffer) = slot.memory().and_then(|m| m.device.as_ref()) {
                tracing::warn!(
                    "plane {plane}: device buffer #{} dropped without free; leaked on the device",
                    buffer.id()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_planes() {
        let desc = BufferDescriptor::from_planes(2, [vec![4, 3], vec![2, 2]]).unwrap();
        assert_eq!(desc.plane_count(), 2);
        assert_eq!(desc.dim_count(), 2);
        assert_eq!(desc.extents(1), Some(&[2, 2][..]));
        assert_eq!(desc.strides(0), Some(&[0, 0][..]));
        assert!(!desc.is_allocated());
    }

    #[test]
    fn test_rejects_mismatched_rank() {
        let err = BufferDescriptor::from_planes(2, [vec![4, 3, 1]]).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidLayout(_)));
    }

    #[test]
    fn test_set_extent_and_channel_stride() {
        let mut desc = BufferDescriptor::from_planes(2, [vec![0, 0]]).unwrap();
        desc.set_extent(0, 0, 8).unwrap();
        desc.set_extent(0, 1, 2).unwrap();
        desc.set_channel_stride(0, 4).unwrap();
        assert_eq!(desc.extents(0), Some(&[8, 2][..]));
        assert_eq!(desc.strides(0), Some(&[4, 0][..]));

        assert!(desc.set_extent(0, 2, 1).is_err());
        assert!(desc.set_extent(1, 0, 1).is_err());
    }

    #[test]
    fn test_channel_stride_needs_a_dimension() {
        let mut desc = BufferDescriptor::from_planes(0, [vec![]]).unwrap();
        assert!(desc.set_channel_stride(0, 2).is_err());
    }

    #[test]
    fn test_unallocated_accessors() {
        let desc = BufferDescriptor::from_planes(1, [vec![16]]).unwrap();
        assert!(desc.host_ptr(0).is_none());
        assert!(desc.host_block(0).is_none());
        assert!(desc.plane_slice(0).is_none());
        assert!(desc.plane_lock(0).is_none());
        assert!(desc.device_buffer(0).is_none());
        assert!(desc.extents(5).is_none());
    }

    #[test]
    fn test_plane_slice_writes_keep_storage() {
        let ctx = crate::MemoryContext::new();
        let mut desc = BufferDescriptor::from_planes(2, [vec![4, 3]]).unwrap();
        desc.try_allocate(&ctx).unwrap();
        let ptr = desc.host_ptr(0).unwrap();

        for (i, byte) in desc.plane_slice_mut(0).unwrap().iter_mut().enumerate() {
            byte.write(i as u8);
        }

        let view = desc.plane_slice(0).unwrap();
        assert_eq!(view.len(), 12);
        assert_eq!(view.as_ptr().cast::<u8>(), ptr.as_ptr().cast_const());
        assert_eq!(desc.host_ptr(0), Some(ptr));
        assert_eq!(desc.host_block(0).unwrap().len(), desc.plane_byte_size(0).unwrap());
        assert_eq!(unsafe { desc.host_block(0).unwrap().as_slice() }[11], 11);
        assert!(desc.plane_slice_mut(1).is_none());
        desc.free(&ctx);
        assert!(desc.plane_slice(0).is_none());
    }
}
