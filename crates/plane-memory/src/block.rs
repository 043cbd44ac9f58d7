// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII host block that returns its memory to the heap on drop.
//!
//! [`HostBlock`] is the exclusive owner of one plane's host storage. The
//! memory is uninitialised when handed out; callers either write through
//! [`HostBlock::as_uninit_mut`] / [`HostBlock::fill`] or use the raw pointer.

use crate::heap::{HeapInner, HOST_ALIGNMENT};
use std::alloc::{alloc, dealloc, Layout};
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::Arc;

#[allow(dead_code)]
#[repr(align(64))]
struct HostAlign([u8; HOST_ALIGNMENT]);

/// An owned, aligned, uninitialised host allocation.
///
/// # Example
/// ```
/// use plane_memory::HostHeap;
///
/// let heap = HostHeap::unbounded();
/// let mut block = heap.allocate(16).unwrap();
/// let bytes = block.fill(0xAB);
/// assert_eq!(bytes.len(), 16);
/// drop(block);
/// assert_eq!(heap.live_bytes(), 0);
/// ```
pub struct HostBlock {
    ptr: NonNull<u8>,
    layout: Layout,
    heap: Arc<HeapInner>,
}

impl HostBlock {
    /// Allocates `size_bytes` from the global allocator. Returns `None` if
    /// the allocator is exhausted or the size cannot form a valid layout.
    ///
    /// Zero-byte blocks never touch the allocator.
    pub(crate) fn allocate(size_bytes: usize, heap: Arc<HeapInner>) -> Option<Self> {
        let layout = Layout::from_size_align(size_bytes, HOST_ALIGNMENT).ok()?;
        let ptr = if size_bytes == 0 {
            NonNull::<HostAlign>::dangling().cast::<u8>()
        } else {
            // SAFETY: `layout` has a non-zero size.
            NonNull::new(unsafe { alloc(layout) })?
        };
        Some(Self { ptr, layout, heap })
    }

    /// Returns the base address of the block.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Returns the base address of the block for writing.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Returns the base address as a non-null pointer.
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Returns the size of this block in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Returns `true` for a zero-byte block.
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    /// Returns the block as possibly-uninitialised bytes, read-only.
    pub fn as_uninit(&self) -> &[MaybeUninit<u8>] {
        // SAFETY: the block owns `len()` bytes at `ptr`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().cast(), self.len()) }
    }

    /// Returns the block as possibly-uninitialised bytes.
    pub fn as_uninit_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        // SAFETY: the block owns `len()` bytes at `ptr`; `MaybeUninit` makes
        // no claim about their contents.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.len()) }
    }

    /// Initialises every byte to `byte` and returns the initialised view.
    pub fn fill(&mut self, byte: u8) -> &mut [u8] {
        let len = self.len();
        // SAFETY: `write_bytes` initialises all `len` bytes before the slice
        // over them is formed.
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr(), byte, len);
            std::slice::from_raw_parts_mut(self.ptr.as_ptr(), len)
        }
    }

    /// Returns the block as initialised bytes.
    ///
    /// # Safety
    /// Every byte must have been written since allocation (for example via
    /// [`fill`](Self::fill) or through the device view).
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len())
    }
}

impl Drop for HostBlock {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            // SAFETY: `ptr` came from `alloc(self.layout)` and drop runs once.
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        }
        self.heap.return_block(self.layout.size());
    }
}

// SAFETY: the block is the unique owner of its allocation; shared access only
// exposes the address or goes through `unsafe fn as_slice`.
unsafe impl Send for HostBlock {}
unsafe impl Sync for HostBlock {}

impl std::fmt::Debug for HostBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBlock")
            .field("ptr", &self.ptr)
            .field("size_bytes", &self.len())
            .finish()
    }
}
