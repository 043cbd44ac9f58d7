// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plane sizes and state dumps.

use crate::BufferDescriptor;

/// Whether a plane's lock could be taken at the moment it was probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// Nobody holds the lock.
    Free,
    /// A consumer holds the lock.
    Held,
    /// The plane is not allocated, so it has no lock.
    Absent,
}

impl LockState {
    fn label(self) -> &'static str {
        match self {
            LockState::Free => "UNLOCKED",
            LockState::Held => "LOCKED",
            LockState::Absent => "NO LOCK",
        }
    }
}

/// Snapshot of one plane, as produced by [`BufferDescriptor::dump_state`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlaneReport {
    pub plane: usize,
    /// Host address, when allocated.
    pub host_ptr: Option<usize>,
    /// Device buffer id, when the plane has a device view.
    pub device_buffer: Option<u64>,
    pub lock: LockState,
    pub extents: Vec<usize>,
    pub strides: Vec<isize>,
}

impl BufferDescriptor {
    /// Bytes spanned by `plane`: its last extent times its last stride.
    ///
    /// `Some(0)` for a descriptor without dimensions, `None` if the plane
    /// does not exist or its size does not fit in `usize`. Valid before
    /// allocation, but derived strides are only planned by allocation.
    pub fn plane_byte_size(&self, plane: usize) -> Option<usize> {
        let layout = self.layouts.get(plane)?;
        match (layout.extents.last(), layout.strides.last()) {
            (Some(&extent), Some(&stride)) => extent.checked_mul(stride.unsigned_abs()),
            _ => Some(0),
        }
    }

    /// Reports every plane's address, lock state, extents and strides, and
    /// traces the same at debug level.
    ///
    /// Locks are probed with a trial acquire that is released at once, so
    /// holders are never disturbed.
    pub fn dump_state(&self) -> Vec<PlaneReport> {
        self.layouts
            .iter()
            .enumerate()
            .map(|(plane, layout)| {
                let memory = self.memory(plane);
                let lock = match memory {
                    Some(m) if m.lock.is_free() => LockState::Free,
                    Some(_) => LockState::Held,
                    None => LockState::Absent,
                };
                let host_ptr = memory.map(|m| m.host.as_ptr() as usize);
                tracing::debug!(
                    "ptr[{plane}]={:#x} {}",
                    host_ptr.unwrap_or(0),
                    lock.label()
                );
                for (dim, (extent, stride)) in layout.extents.iter().zip(&layout.strides).enumerate() {
                    tracing::debug!("\tdim[{plane}][{dim}]={extent} strides[{plane}][{dim}]={stride}");
                }
                PlaneReport {
                    plane,
                    host_ptr,
                    device_buffer: memory.and_then(|m| m.device.as_ref()).map(|b| b.id()),
                    lock,
                    extents: layout.extents.clone(),
                    strides: layout.strides.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{BufferDescriptor, LockState, MemoryContext};

    #[test]
    fn test_plane_byte_size() {
        let ctx = MemoryContext::new();
        let mut desc = BufferDescriptor::from_planes(3, [vec![3, 10, 5]]).unwrap();
        desc.set_channel_stride(0, 2).unwrap();
        assert_eq!(desc.plane_byte_size(0), Some(0));

        desc.allocate(&ctx);
        assert_eq!(desc.strides(0), Some(&[2, 6, 60][..]));
        assert_eq!(desc.plane_byte_size(0), Some(300));
        assert_eq!(desc.plane_byte_size(1), None);
    }

    #[test]
    fn test_byte_size_overflow_is_none() {
        let mut desc = BufferDescriptor::from_planes(1, [vec![usize::MAX]]).unwrap();
        desc.set_channel_stride(0, 2).unwrap();
        assert_eq!(desc.plane_byte_size(0), None);

        desc.set_channel_stride(0, -1).unwrap();
        assert_eq!(desc.plane_byte_size(0), Some(usize::MAX));
    }

    #[test]
    fn test_byte_size_without_dimensions() {
        let ctx = MemoryContext::new();
        let mut desc = BufferDescriptor::from_planes(0, [vec![]]).unwrap();
        assert!(desc.allocate(&ctx));
        assert_eq!(desc.plane_byte_size(0), Some(0));
        assert_eq!(desc.host_block(0).map(|b| b.len()), Some(1));
    }

    #[test]
    fn test_dump_reports_lock_state() {
        let ctx = MemoryContext::new();
        let mut desc = BufferDescriptor::from_planes(2, [vec![4, 3], vec![2, 2]]).unwrap();

        let before = desc.dump_state();
        assert!(before.iter().all(|r| r.lock == LockState::Absent && r.host_ptr.is_none()));

        desc.allocate(&ctx);
        let guard = desc.plane_lock(1).unwrap().try_lock().unwrap();
        let report = desc.dump_state();
        assert_eq!(report[0].lock, LockState::Free);
        assert_eq!(report[1].lock, LockState::Held);
        assert_eq!(report[0].strides, vec![1, 4]);
        assert_eq!(report[0].host_ptr, desc.host_ptr(0).map(|p| p.as_ptr() as usize));
        drop(guard);

        // The dump left both locks as it found them.
        assert!(desc.plane_lock(0).unwrap().is_free());
        assert!(desc.plane_lock(1).unwrap().is_free());
        desc.free(&ctx);
    }

    #[test]
    fn test_report_serializes() {
        let desc = BufferDescriptor::from_planes(1, [vec![5]]).unwrap();
        let json = serde_json::to_string(&desc.dump_state()).unwrap();
        assert!(json.contains("\"lock\":\"absent\""));
        assert!(json.contains("\"extents\":[5]"));
    }
}
