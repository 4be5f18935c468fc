//! Dataset manifest parsing
//!
//! Only the fields the engine needs are modelled; unknown fields are ignored.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::atlas::config::{AtlasConfig, AtlasSizes};
use crate::core::error::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Atlas section of the manifest
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AtlasManifest {
    /// Number of atlas files
    pub count: usize,
    /// Packed `[x, y]` of every cell, grouped per atlas
    #[serde(default)]
    pub positions: Vec<Vec<[f32; 2]>>,
}

/// Position files of one layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub layout: String,
    #[serde(default)]
    pub jittered: Option<String>,
}

/// Pixel sizes the atlases were built with
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ManifestSizes {
    pub cell: Option<u32>,
    pub atlas: Option<u32>,
    pub lod: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub sizes: ManifestSizes,
}

/// Top-level manifest
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub atlas: AtlasManifest,
    /// `[w, h]` of every cell inside its atlas, grouped per atlas
    pub cell_sizes: Vec<Vec<[u32; 2]>>,
    #[serde(default)]
    pub layouts: BTreeMap<String, LayoutEntry>,
    /// Image filenames in cell order
    pub images: Vec<String>,
    #[serde(default)]
    pub config: ManifestConfig,
}

impl Manifest {
    /// Parse a manifest, gunzipping it first when needed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let text = maybe_gunzip(bytes)?;
        let manifest: Manifest = serde_json::from_slice(&text)
            .map_err(|e| Error::Manifest(format!("invalid manifest JSON: {}", e)))?;
        manifest.check_shape()?;
        log::info!(
            "Manifest: {} images in {} atlases, {} layouts",
            manifest.images.len(), manifest.atlas.count, manifest.layouts.len()
        );
        Ok(manifest)
    }

    fn check_shape(&self) -> Result<(), Error> {
        if self.atlas.count != self.cell_sizes.len() {
            return Err(Error::Manifest(format!(
                "atlas count {} does not match {} cell size groups",
                self.atlas.count, self.cell_sizes.len()
            )));
        }
        let sized: usize = self.cell_sizes.iter().map(Vec::len).sum();
        if sized != self.images.len() {
            return Err(Error::Manifest(format!(
                "{} images but {} cell sizes", self.images.len(), sized
            )));
        }
        Ok(())
    }

    /// Check the atlas grouping against the derived packing.
    ///
    /// Every atlas but the last must be full, since cell locations are
    /// computed from the global index alone.
    pub fn validate_packing(&self, config: &AtlasConfig) -> Result<(), Error> {
        let per_atlas = config.cells_per_atlas as usize;
        let last = self.cell_sizes.len().saturating_sub(1);
        for (i, group) in self.cell_sizes.iter().enumerate() {
            if group.len() > per_atlas || (i < last && group.len() != per_atlas) {
                return Err(Error::Manifest(format!(
                    "atlas {} holds {} cells, expected {}{}",
                    i, group.len(), if i < last { "" } else { "at most " }, per_atlas
                )));
            }
        }
        Ok(())
    }

    /// Sizes declared by the manifest, with `defaults` filling the gaps.
    pub fn sizes(&self, defaults: AtlasSizes) -> AtlasSizes {
        let declared = self.config.sizes;
        AtlasSizes {
            cell_px: declared.cell.unwrap_or(defaults.cell_px),
            atlas_px: declared.atlas.unwrap_or(defaults.atlas_px),
            lod_cell_px: declared.lod.unwrap_or(defaults.lod_cell_px),
            lod_texture_px: defaults.lod_texture_px,
        }
    }

    /// Cell sizes flattened into global index order
    pub fn flat_cell_sizes(&self) -> impl Iterator<Item = [u32; 2]> + '_ {
        self.cell_sizes.iter().flatten().copied()
    }

    /// Path of a layout's position file, relative to the data directory.
    /// Falls back to the plain file when no jittered variant exists.
    pub fn layout_path(&self, name: &str, jittered: bool) -> Result<&str, Error> {
        let entry = self
            .layouts
            .get(name)
            .ok_or_else(|| Error::Layout(format!("unknown layout '{}'", name)))?;
        Ok(match (&entry.jittered, jittered) {
            (Some(path), true) => path.as_str(),
            _ => entry.layout.as_str(),
        })
    }
}

/// Gunzip `bytes` if they carry the gzip magic, else return them unchanged.
pub fn maybe_gunzip(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::location::test_config;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    fn sample_json() -> String {
        serde_json::json!({
            "atlas": { "count": 2, "positions": [[[0, 0], [2, 0], [0, 2], [2, 2]], [[0, 0]]] },
            "cell_sizes": [[[2, 1], [2, 2], [1, 2], [2, 2]], [[2, 2]]],
            "layouts": {
                "umap": { "layout": "layouts/umap.json", "jittered": "layouts/umap-jittered.json" },
                "grid": { "layout": "layouts/grid.json" }
            },
            "images": ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"],
            "config": { "sizes": { "cell": 2, "atlas": 4 } },
            "point_size": { "min": 0, "grid": 0 }
        })
        .to_string()
    }

    #[test]
    fn test_parse() {
        let manifest = Manifest::from_bytes(sample_json().as_bytes()).unwrap();
        assert_eq!(manifest.images.len(), 5);
        assert_eq!(manifest.atlas.count, 2);
        assert_eq!(manifest.flat_cell_sizes().collect::<Vec<_>>()[4], [2, 2]);

        let sizes = manifest.sizes(AtlasSizes::default());
        assert_eq!(sizes.cell_px, 2);
        assert_eq!(sizes.atlas_px, 4);
        assert_eq!(sizes.lod_cell_px, 128);
    }

    #[test]
    fn test_parse_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(sample_json().as_bytes()).unwrap();
        let bytes = encoder.finish().unwrap();

        let manifest = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(manifest.images[0], "a.jpg");
    }

    #[test]
    fn test_layout_paths() {
        let manifest = Manifest::from_bytes(sample_json().as_bytes()).unwrap();
        assert_eq!(manifest.layout_path("umap", true).unwrap(), "layouts/umap-jittered.json");
        assert_eq!(manifest.layout_path("umap", false).unwrap(), "layouts/umap.json");
        assert_eq!(manifest.layout_path("grid", true).unwrap(), "layouts/grid.json");
        assert!(matches!(manifest.layout_path("tsne", false), Err(Error::Layout(_))));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let json = sample_json().replace("\"e.jpg\"", "\"e.jpg\", \"f.jpg\"");
        assert!(matches!(Manifest::from_bytes(json.as_bytes()), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(Manifest::from_bytes(b"not json"), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_validate_packing() {
        let manifest = Manifest::from_bytes(sample_json().as_bytes()).unwrap();
        // 4 cells per atlas: first atlas full, last partial
        assert!(manifest.validate_packing(&test_config(2, 2, 8)).is_ok());
        // 1 cell per atlas: first atlas overflows
        assert!(manifest.validate_packing(&test_config(1, 2, 8)).is_err());
    }
}
