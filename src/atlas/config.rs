//! Geometric constants derived from the capability probe and manifest sizes

use crate::core::error::Error;
use crate::render::caps::Capabilities;

/// Requested pixel sizes, before they are fitted to the graphics context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasSizes {
    /// Edge of one base-resolution cell inside an atlas
    pub cell_px: u32,
    /// Edge of one high-resolution slot inside the LOD texture
    pub lod_cell_px: u32,
    /// Edge of one atlas file
    pub atlas_px: u32,
    /// Requested LOD texture edge, clamped to the texture size
    pub lod_texture_px: Option<u32>,
}

impl Default for AtlasSizes {
    fn default() -> Self {
        Self {
            cell_px: 32,
            lod_cell_px: 128,
            atlas_px: 2048,
            lod_texture_px: None,
        }
    }
}

/// Immutable layout constants shared by the loader, the partitioner and the
/// LOD cache. All index arithmetic goes through [`crate::cell::CellLocation`],
/// which reads these values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    pub cell_px: u32,
    pub lod_cell_px: u32,
    pub atlas_px: u32,
    pub texture_px: u32,
    pub lod_texture_px: u32,
    pub atlases_per_texture: u32,
    pub cells_per_atlas: u32,
    pub cells_per_texture: u32,
    pub max_cells_per_draw_call: u32,
}

impl AtlasConfig {
    /// Fit the requested sizes to the capability limits.
    pub fn derive(caps: &Capabilities, sizes: &AtlasSizes) -> Result<Self, Error> {
        let AtlasSizes { cell_px, lod_cell_px, atlas_px, lod_texture_px } = *sizes;

        if cell_px == 0 || lod_cell_px == 0 || atlas_px == 0 {
            return Err(Error::Config(format!("zero pixel size in {:?}", sizes)));
        }
        if atlas_px % cell_px != 0 {
            return Err(Error::Config(format!(
                "cell size {}px does not divide atlas size {}px", cell_px, atlas_px
            )));
        }
        if atlas_px > caps.texture_size {
            return Err(Error::Config(format!(
                "atlas size {}px exceeds maximum texture size {}px", atlas_px, caps.texture_size
            )));
        }

        // Largest multiple of the atlas edge that still fits
        let texture_px = caps.texture_size / atlas_px * atlas_px;
        let lod_texture_px = lod_texture_px.unwrap_or(caps.texture_size).min(caps.texture_size);
        if lod_texture_px < lod_cell_px || lod_texture_px % lod_cell_px != 0 {
            return Err(Error::Config(format!(
                "LOD cell size {}px does not tile LOD texture {}px", lod_cell_px, lod_texture_px
            )));
        }

        let atlases_per_texture = (texture_px / atlas_px).pow(2);
        let cells_per_atlas = (atlas_px / cell_px).pow(2);
        let cells_per_texture = atlases_per_texture * cells_per_atlas;

        let by_units = (caps.atlas_texture_units() as u64 * cells_per_texture as u64)
            .min(u32::MAX as u64) as u32;
        let mut max_cells_per_draw_call = caps.max_indexed_vertices.min(by_units);
        // Align partitions to texture boundaries so none binds more textures than units
        if max_cells_per_draw_call >= cells_per_texture {
            max_cells_per_draw_call -= max_cells_per_draw_call % cells_per_texture;
        }

        Ok(Self {
            cell_px,
            lod_cell_px,
            atlas_px,
            texture_px,
            lod_texture_px,
            atlases_per_texture,
            cells_per_atlas,
            cells_per_texture,
            max_cells_per_draw_call,
        })
    }

    /// Atlases along one edge of a texture canvas
    pub fn atlases_per_row(&self) -> u32 {
        self.texture_px / self.atlas_px
    }

    /// Cells along one edge of an atlas
    pub fn cells_per_atlas_row(&self) -> u32 {
        self.atlas_px / self.cell_px
    }

    /// Total reusable slots in the LOD texture
    pub fn lod_slot_count(&self) -> u32 {
        (self.lod_texture_px / self.lod_cell_px).pow(2)
    }

    /// Number of atlases needed for `cell_count` cells
    pub fn atlas_count(&self, cell_count: usize) -> usize {
        cell_count.div_ceil(self.cells_per_atlas as usize)
    }

    /// Number of textures needed for `atlas_count` atlases
    pub fn texture_count(&self, atlas_count: usize) -> usize {
        atlas_count.div_ceil(self.atlases_per_texture as usize)
    }

    /// Number of draw calls needed for `cell_count` cells
    pub fn draw_call_count(&self, cell_count: usize) -> usize {
        cell_count.div_ceil(self.max_cells_per_draw_call as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(texture_size: u32, units: u32, vertices: u32) -> Capabilities {
        Capabilities { texture_size, texture_unit_count: units, max_indexed_vertices: vertices }
    }

    #[test]
    fn test_derive_defaults() {
        let config = AtlasConfig::derive(&caps(8192, 16, u32::MAX), &AtlasSizes::default()).unwrap();
        assert_eq!(config.texture_px, 8192);
        assert_eq!(config.atlases_per_texture, 16);
        assert_eq!(config.cells_per_atlas, 4096);
        assert_eq!(config.cells_per_texture, 65536);
        // 15 atlas samplers per draw call
        assert_eq!(config.max_cells_per_draw_call, 15 * 65536);
        assert_eq!(config.lod_slot_count(), 64 * 64);
    }

    #[test]
    fn test_texture_rounds_down_to_atlas_multiple() {
        let sizes = AtlasSizes { atlas_px: 3000, cell_px: 100, ..Default::default() };
        let config = AtlasConfig::derive(&caps(8192, 16, 65536), &sizes).unwrap();
        assert_eq!(config.texture_px, 6000);
        assert_eq!(config.atlases_per_texture, 4);
    }

    #[test]
    fn test_index_width_bounds_draw_call() {
        let config = AtlasConfig::derive(&caps(4096, 16, 65536), &AtlasSizes::default()).unwrap();
        assert_eq!(config.max_cells_per_draw_call, 65536);
    }

    #[test]
    fn test_draw_call_aligned_to_textures() {
        let sizes = AtlasSizes { atlas_px: 3000, cell_px: 100, ..Default::default() };
        let config = AtlasConfig::derive(&caps(8192, 32, 65536), &sizes).unwrap();
        assert_eq!(config.cells_per_texture, 3600);
        assert_eq!(config.max_cells_per_draw_call, 64800);
        assert_eq!(config.max_cells_per_draw_call % config.cells_per_texture, 0);
    }

    #[test]
    fn test_rejects_oversized_atlas() {
        let result = AtlasConfig::derive(&caps(1024, 16, 65536), &AtlasSizes::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_uneven_cells() {
        let sizes = AtlasSizes { cell_px: 30, ..Default::default() };
        assert!(AtlasConfig::derive(&caps(4096, 16, 65536), &sizes).is_err());
    }

    #[test]
    fn test_lod_texture_clamped() {
        let sizes = AtlasSizes { lod_texture_px: Some(16384), ..Default::default() };
        let config = AtlasConfig::derive(&caps(4096, 16, 65536), &sizes).unwrap();
        assert_eq!(config.lod_texture_px, 4096);
        assert_eq!(config.lod_slot_count(), 32 * 32);
    }

    #[test]
    fn test_counts_round_up() {
        let sizes = AtlasSizes { cell_px: 1, atlas_px: 2, lod_cell_px: 2, lod_texture_px: Some(4) };
        let config = AtlasConfig::derive(&caps(4, 3, 65536), &sizes).unwrap();
        assert_eq!(config.cells_per_atlas, 4);
        assert_eq!(config.atlases_per_texture, 4);
        assert_eq!(config.atlas_count(10), 3);
        assert_eq!(config.texture_count(3), 1);
        assert_eq!(config.atlas_count(0), 0);
    }
}
