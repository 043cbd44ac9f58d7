// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stride planning for one plane.
//!
//! Strides are byte strides in a layout where dimension 0 varies fastest.
//! Dimension 0 is the channel dimension: its stride, when the caller seeds
//! it, fixes the element size; every other stride is derived.
//!
//! ```text
//! extents  [ 4, 3 ]        channel stride 0 (→ 1 byte)
//! strides  [ 1, 4 ]        total 12 bytes
//! ```

/// Index of the channel dimension.
pub const CHANNEL_DIM: usize = 0;

/// Byte strides and total size computed for a plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridePlan {
    /// Byte stride per dimension.
    pub strides: Vec<isize>,
    /// Bytes needed to hold the plane.
    pub total_bytes: usize,
}

/// The running size stopped fitting in a stride or a `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stride overflow at dimension {dim}")]
pub struct StrideOverflow {
    /// Dimension whose stride or extent overflowed.
    pub dim: usize,
}

/// Element size implied by a caller-seeded channel stride.
///
/// Zero means "not declared" and yields one byte. A negative stride is
/// accepted and its magnitude used; reversed layouts are not supported.
pub fn element_size(channel_stride: isize) -> usize {
    if channel_stride == 0 {
        1
    } else {
        channel_stride.unsigned_abs()
    }
}

/// Plans the strides of a plane from its extents.
///
/// `strides[d]` is the element size times the product of `extents[..d]`, and
/// `total_bytes` is the element size times the product of all extents. With
/// no dimensions the plane is a single element.
pub fn plan_strides(extents: &[usize], channel_stride: isize) -> Result<StridePlan, StrideOverflow> {
    let mut size = element_size(channel_stride);
    let mut strides = Vec::with_capacity(extents.len());
    for (dim, &extent) in extents.iter().enumerate() {
        let stride = isize::try_from(size).map_err(|_| StrideOverflow { dim })?;
        strides.push(stride);
        size = size.checked_mul(extent).ok_or(StrideOverflow { dim })?;
    }
    Ok(StridePlan {
        strides,
        total_bytes: size,
    })
}
