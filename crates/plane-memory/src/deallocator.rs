// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Teardown of an allocated descriptor.

use crate::allocator::release_buffer;
use crate::descriptor::{PlaneMemory, PlaneSlot};
use crate::{BufferDescriptor, MemoryContext};

impl BufferDescriptor {
    /// Releases every plane's device view, host memory and lock.
    ///
    /// Returns the resulting allocation state, which is always `false`.
    /// Calling it on an unallocated descriptor does nothing. Each slot is
    /// emptied as it is released, so nothing can be released twice.
    ///
    /// Device views are released without a separate unmap: their mapping is
    /// the host block itself.
    pub fn free(&mut self, ctx: &MemoryContext) -> bool {
        if !self.allocated {
            return self.allocated;
        }
        let _span = ctx.span().enter();
        self.dump_state();

        for (plane, slot) in self.slots.iter_mut().enumerate() {
            let PlaneSlot::Allocated(PlaneMemory { host, device, lock }) = std::mem::take(slot) else {
                continue;
            };
            if let Some(buffer) = device {
                match ctx.device() {
                    Some(dev) => release_buffer(dev, buffer),
                    None => tracing::warn!(
                        "plane {plane}: context has no device to release buffer #{}",
                        buffer.id()
                    ),
                }
            }
            tracing::info!("plane {plane}: freeing {:p}", host.as_ptr());
            drop(host);
            drop(lock);
        }

        self.allocated = false;
        self.allocated
    }
}

/// Frees `descriptor` against `ctx`, returning the resulting allocation
/// state (`false`).
pub fn free_memory(descriptor: &mut BufferDescriptor, ctx: &MemoryContext) -> bool {
    descriptor.free(ctx)
}
