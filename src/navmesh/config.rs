//! Navmesh configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::math::morton::{MAX_DEPTH, NODE_HALF_SIZES, NODE_SIZES};

/// Settings shared by generation, updates and persistence.
///
/// Built once and handed around by reference; nothing reads configuration
/// from global state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavmeshConfig {
    /// Deepest layer reached by rasterization (1..=9). Layer 5 gives 32 unit nodes.
    pub static_depth: u8,
    /// Compress chunk files with LZ4.
    pub compress_chunks: bool,
    /// Use the exact oracle test for boxes fully inside an occluder's bounds.
    pub exact_contained_tests: bool,
}

impl Default for NavmeshConfig {
    fn default() -> Self {
        Self {
            static_depth: 5,
            compress_chunks: true,
            exact_contained_tests: true,
        }
    }
}

impl NavmeshConfig {
    pub fn with_static_depth(static_depth: u8) -> Self {
        Self {
            static_depth,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.static_depth == 0 || self.static_depth >= MAX_DEPTH {
            return Err(Error::Config(format!(
                "static_depth must be within 1..={}, got {}",
                MAX_DEPTH - 1,
                self.static_depth
            )));
        }
        Ok(())
    }

    /// Edge length of a node on `layer`.
    pub fn node_size(&self, layer: u8) -> i32 {
        NODE_SIZES[layer as usize]
    }

    pub fn node_half_size(&self, layer: u8) -> i32 {
        NODE_HALF_SIZES[layer as usize]
    }

    /// Number of layers stored per chunk, root included.
    pub fn layer_count(&self) -> usize {
        self.static_depth as usize + 1
    }

    /// Load from a JSON file, validating the result.
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
