// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Buffer layout configuration loaded from TOML files.
//!
//! # TOML Format
//! ```toml
//! dim_count = 2
//! host_budget = "64M"
//! device = "host-mirror"
//!
//! [[planes]]
//! extents = [640, 480]
//!
//! [[planes]]
//! extents = [320, 240]
//! channel_stride = 2
//! ```

use plane_memory::{
    BufferDescriptor, HostMirrorDevice, MemoryBudget, MemoryContext, MemoryError,
};
use std::path::Path;
use std::sync::Arc;

/// A descriptor layout plus the context to allocate it in.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutConfig {
    /// Dimensions per plane.
    pub dim_count: usize,
    /// Host budget (human-readable, e.g. `"64M"`); unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_budget: Option<String>,
    /// Device backend: `"none"` or `"host-mirror"`.
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub planes: Vec<PlaneConfig>,
}

/// One plane of a [`LayoutConfig`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlaneConfig {
    pub extents: Vec<usize>,
    /// Declared element size in bytes; 0 for the one-byte default.
    #[serde(default)]
    pub channel_stride: isize,
}

fn default_device() -> String {
    "none".to_string()
}

/// The device a layout asks for, kept concrete so its counters can be shown.
pub enum DeviceChoice {
    None,
    HostMirror(Arc<HostMirrorDevice>),
}

impl LayoutConfig {
    /// Loads a layout from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, MemoryError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MemoryError::InvalidLayout(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a layout from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, MemoryError> {
        toml::from_str(toml_str)
            .map_err(|e| MemoryError::InvalidLayout(format!("TOML parse error: {e}")))
    }

    /// Serialises the layout to TOML.
    pub fn to_toml(&self) -> Result<String, MemoryError> {
        toml::to_string_pretty(self)
            .map_err(|e| MemoryError::InvalidLayout(format!("TOML serialise error: {e}")))
    }

    /// Parses the host budget, if any.
    pub fn parse_budget(&self) -> Result<Option<MemoryBudget>, MemoryError> {
        self.host_budget.as_deref().map(MemoryBudget::parse).transpose()
    }

    /// Resolves the device backend.
    pub fn device_choice(&self) -> Result<DeviceChoice, MemoryError> {
        match self.device.to_lowercase().as_str() {
            "none" | "" => Ok(DeviceChoice::None),
            "host-mirror" | "mirror" => Ok(DeviceChoice::HostMirror(Arc::new(HostMirrorDevice::new()))),
            other => Err(MemoryError::InvalidLayout(format!(
                "unknown device '{other}'; expected 'none' or 'host-mirror'"
            ))),
        }
    }

    /// Builds an unallocated descriptor with the configured planes.
    pub fn build_descriptor(&self) -> Result<BufferDescriptor, MemoryError> {
        let mut desc = BufferDescriptor::new(self.dim_count);
        for plane in &self.planes {
            let index = desc.add_plane(plane.extents.clone())?;
            if plane.channel_stride != 0 {
                desc.set_channel_stride(index, plane.channel_stride)?;
            }
        }
        Ok(desc)
    }

    /// Builds the context the layout should be allocated in.
    pub fn build_context(&self, name: &str, device: &DeviceChoice) -> Result<MemoryContext, MemoryError> {
        let mut builder = MemoryContext::builder().name(name);
        if let Some(budget) = self.parse_budget()? {
            builder = builder.budget(budget);
        }
        if let DeviceChoice::HostMirror(mirror) = device {
            builder = builder.device(mirror.clone());
        }
        Ok(builder.build())
    }
}
