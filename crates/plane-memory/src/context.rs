// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The owning context that allocation and deallocation run against.

use crate::{DeviceContext, HostHeap, MemoryBudget};
use std::sync::Arc;

/// Everything the allocator consumes from its owner: a host heap, an
/// optional device context, and the diagnostics span its traces go to.
///
/// The allocator never mutates a context, so one context can serve many
/// descriptors (clone it or share it by reference).
///
/// # Example
/// ```
/// use plane_memory::{HostMirrorDevice, MemoryBudget, MemoryContext};
/// use std::sync::Arc;
///
/// let ctx = MemoryContext::builder()
///     .name("camera")
///     .budget(MemoryBudget::from_mb(16))
///     .device(Arc::new(HostMirrorDevice::new()))
///     .build();
/// assert!(ctx.has_device());
/// ```
#[derive(Clone)]
pub struct MemoryContext {
    heap: HostHeap,
    device: Option<Arc<dyn DeviceContext>>,
    span: tracing::Span,
}

impl MemoryContext {
    /// A host-only context over an unbounded heap.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a context.
    pub fn builder() -> MemoryContextBuilder {
        MemoryContextBuilder::default()
    }

    /// The host heap planes are allocated from.
    pub fn heap(&self) -> &HostHeap {
        &self.heap
    }

    /// The device context, if one is active.
    pub fn device(&self) -> Option<&dyn DeviceContext> {
        self.device.as_deref()
    }

    /// Returns `true` when planes get device views.
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Span entered by every allocate, free and dump run through this context.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContext")
            .field("heap", &self.heap)
            .field("device", &self.device.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

/// Builder for [`MemoryContext`].
#[derive(Default)]
pub struct MemoryContextBuilder {
    name: Option<String>,
    heap: Option<HostHeap>,
    device: Option<Arc<dyn DeviceContext>>,
    span: Option<tracing::Span>,
}

impl MemoryContextBuilder {
    /// Names the context in its diagnostics span.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Uses an existing heap (shares its budget and statistics).
    pub fn heap(mut self, heap: HostHeap) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Uses a fresh heap capped at `budget`.
    pub fn budget(mut self, budget: MemoryBudget) -> Self {
        self.heap = Some(HostHeap::with_budget(budget));
        self
    }

    /// Activates a device context.
    pub fn device(mut self, device: Arc<dyn DeviceContext>) -> Self {
        self.device = Some(device);
        self
    }

    /// Routes traces into `span` instead of the default one.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> MemoryContext {
        let span = self.span.unwrap_or_else(|| {
            let name = self.name.as_deref().unwrap_or("default");
            let device = self.device.as_ref().map_or("none", |d| d.name());
            tracing::info_span!("plane_memory", context = %name, device = %device)
        });
        MemoryContext {
            heap: self.heap.unwrap_or_default(),
            device: self.device,
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostMirrorDevice;

    #[test]
    fn test_default_is_host_only() {
        let ctx = MemoryContext::new();
        assert!(!ctx.has_device());
        assert!(ctx.device().is_none());
        assert_eq!(ctx.heap().budget(), None);
    }

    #[test]
    fn test_builder() {
        let ctx = MemoryContext::builder()
            .name("test")
            .budget(MemoryBudget::from_bytes(128))
            .device(Arc::new(HostMirrorDevice::named("mirror")))
            .build();
        assert_eq!(ctx.heap().budget(), Some(MemoryBudget::from_bytes(128)));
        assert_eq!(ctx.device().map(|d| d.name()), Some("mirror"));
    }

    #[test]
    fn test_shared_heap() {
        let heap = HostHeap::with_budget(MemoryBudget::from_bytes(10));
        let a = MemoryContext::builder().heap(heap.clone()).build();
        let _block = a.heap().allocate(10).unwrap();
        assert_eq!(heap.live_bytes(), 10);
    }

    #[test]
    fn test_debug_names_device() {
        let ctx = MemoryContext::builder()
            .device(Arc::new(HostMirrorDevice::new()))
            .build();
        assert!(format!("{ctx:?}").contains("host-mirror"));
    }
}
