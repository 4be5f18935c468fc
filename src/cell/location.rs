//! Index arithmetic locating a cell in atlases, textures and draw calls
//!
//! Every component that needs to know where a cell's pixels or attributes
//! live goes through [`CellLocation::locate`], so the loader, the partitioner
//! and the LOD cache can never disagree.

use crate::atlas::config::AtlasConfig;

/// Where a cell lives, as a pure function of its global index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellLocation {
    /// Atlas file holding the cell
    pub atlas_index: u32,
    /// Ordinal of the cell inside its atlas
    pub index_in_atlas: u32,
    /// Texture canvas holding the atlas
    pub texture_index: u32,
    /// Draw call owning the cell's attributes
    pub draw_call_index: u32,
    /// Slot of the cell inside its draw call's buffers
    pub index_in_draw_call: u32,
    /// Pixel offset of the cell's top-left corner inside its texture
    pub offset: [u32; 2],
}

impl CellLocation {
    pub fn locate(index: u32, config: &AtlasConfig) -> Self {
        let atlas_index = index / config.cells_per_atlas;
        let index_in_atlas = index % config.cells_per_atlas;
        let texture_index = atlas_index / config.atlases_per_texture;

        let [ax, ay] = atlas_offset(atlas_index % config.atlases_per_texture, config);
        let per_row = config.cells_per_atlas_row();
        let col = index_in_atlas % per_row;
        let row = index_in_atlas / per_row;

        Self {
            atlas_index,
            index_in_atlas,
            texture_index,
            draw_call_index: index / config.max_cells_per_draw_call,
            index_in_draw_call: index % config.max_cells_per_draw_call,
            offset: [ax + col * config.cell_px, ay + row * config.cell_px],
        }
    }
}

/// Pixel offset of an atlas inside its texture canvas, given the atlas's
/// ordinal within that texture. Rows wrap at the canvas width.
pub fn atlas_offset(index_in_texture: u32, config: &AtlasConfig) -> [u32; 2] {
    let per_row = config.atlases_per_row().max(1);
    [
        (index_in_texture % per_row) * config.atlas_px,
        (index_in_texture / per_row) * config.atlas_px,
    ]
}

#[cfg(test)]
pub(crate) fn test_config(cells_per_atlas_row: u32, atlases_per_row: u32, max_cells_per_draw_call: u32) -> AtlasConfig {
    let cell_px = 2;
    let atlas_px = cell_px * cells_per_atlas_row;
    let texture_px = atlas_px * atlases_per_row;
    AtlasConfig {
        cell_px,
        lod_cell_px: 4,
        atlas_px,
        texture_px,
        lod_texture_px: 8,
        atlases_per_texture: atlases_per_row * atlases_per_row,
        cells_per_atlas: cells_per_atlas_row * cells_per_atlas_row,
        cells_per_texture: atlases_per_row * atlases_per_row * cells_per_atlas_row * cells_per_atlas_row,
        max_cells_per_draw_call,
    }
}
