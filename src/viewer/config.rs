//! Viewer settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::atlas::config::AtlasSizes;
use crate::atlas::loader::AtlasPaths;
use crate::cell::manifest::Manifest;
use crate::core::error::Error;
use crate::render::caps::DEFAULT_TEXTURE_SIZE_CAP;
use crate::streaming::lod::LodConfig;

/// Everything needed to open a dataset. Missing fields take their defaults
/// when deserialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Dataset root: a directory or a base URL
    pub data_dir: String,
    /// Manifest path relative to the root
    pub manifest_file: String,
    /// Atlas directory relative to the root
    pub atlas_dir: String,
    /// Atlas file pattern; `{index}` is replaced by the atlas index
    pub atlas_pattern: String,
    pub atlas_fallback_pattern: Option<String>,
    /// Thumbnail directory relative to the root
    pub thumbs_dir: String,
    /// Layout shown at startup; the manifest's first layout when unset
    pub default_layout: Option<String>,
    /// Prefer jittered layout variants when the manifest has them
    pub jittered: bool,
    /// Scale from normalized layout space to world units
    pub world_scale: f32,

    // -- Pixel sizes; unset values come from the manifest ---------------

    pub cell_px: Option<u32>,
    pub lod_cell_px: Option<u32>,
    pub atlas_px: Option<u32>,
    pub lod_texture_px: Option<u32>,

    /// Upper bound on the texture edge regardless of device support
    pub texture_size_cap: u32,
    /// Fetches in flight per loader
    pub max_concurrent_fetches: usize,
    /// Decoded thumbnail bytes kept in memory
    pub image_cache_bytes: usize,
    /// Length of a layout transition in seconds
    pub transition_secs: f32,
    pub lod: LodConfig,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            data_dir: "output/data".into(),
            manifest_file: "manifest.json".into(),
            atlas_dir: "atlases".into(),
            atlas_pattern: "atlas-{index}.jpg".into(),
            atlas_fallback_pattern: None,
            thumbs_dir: "thumbs".into(),
            default_layout: None,
            jittered: false,
            world_scale: 2048.0,
            cell_px: None,
            lod_cell_px: None,
            atlas_px: None,
            lod_texture_px: None,
            texture_size_cap: DEFAULT_TEXTURE_SIZE_CAP,
            max_concurrent_fetches: 8,
            image_cache_bytes: 256 * 1024 * 1024,
            transition_secs: 1.5,
            lod: LodConfig::default(),
        }
    }
}

impl ViewerSettings {
    /// Load settings from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.atlas_pattern.contains("{index}") {
            return Err(Error::Config(format!("atlas pattern '{}' has no {{index}}", self.atlas_pattern)));
        }
        if !(self.world_scale.is_finite() && self.world_scale > 0.0) {
            return Err(Error::Config(format!("world scale must be positive, got {}", self.world_scale)));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(Error::Config("max_concurrent_fetches must be at least 1".into()));
        }
        Ok(())
    }

    /// True when the data root is an HTTP(S) URL
    pub fn is_remote(&self) -> bool {
        self.data_dir.starts_with("http://") || self.data_dir.starts_with("https://")
    }

    pub fn atlas_paths(&self) -> AtlasPaths {
        AtlasPaths {
            dir: self.atlas_dir.clone(),
            pattern: self.atlas_pattern.clone(),
            fallback_pattern: self.atlas_fallback_pattern.clone(),
        }
    }

    /// Pixel sizes: explicit settings, then the manifest, then defaults.
    pub fn atlas_sizes(&self, manifest: &Manifest) -> AtlasSizes {
        let declared = manifest.sizes(AtlasSizes::default());
        AtlasSizes {
            cell_px: self.cell_px.unwrap_or(declared.cell_px),
            lod_cell_px: self.lod_cell_px.unwrap_or(declared.lod_cell_px),
            atlas_px: self.atlas_px.unwrap_or(declared.atlas_px),
            lod_texture_px: self.lod_texture_px.or(declared.lod_texture_px),
        }
    }
}
