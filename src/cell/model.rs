//! Per-image cell records

use crate::atlas::config::AtlasConfig;
use crate::cell::location::CellLocation;
use crate::core::error::Error;
use crate::core::types::Vec3;
use crate::render::buffer::{Attribute, DrawCalls};
use crate::streaming::grid::GridCoord;

/// Which texture currently supplies a cell's pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellTexture {
    /// Base resolution, read from a packed atlas inside a texture canvas
    Atlased { texture_index: u32, offset: [u32; 2] },
    /// High resolution, read from a slot of the shared LOD texture
    LodActive { offset: [u32; 2], size: [u32; 2] },
}

/// Pixel rectangle of a LOD texture slot assigned to a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotRect {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// One visualized image
#[derive(Clone, Debug)]
pub struct Cell {
    /// Stable global ordinal
    pub index: u32,
    /// Image filename, relative to the thumbnail directory
    pub name: String,
    /// Pixel width inside its atlas cell
    pub width: u32,
    /// Pixel height inside its atlas cell
    pub height: u32,
    /// Current position
    pub position: Vec3,
    /// Position the next layout transition blends towards
    pub target: Vec3,
    /// Texture source
    pub texture: CellTexture,
    /// Bucket in the LOD spatial grid
    pub grid: GridCoord,
    pub opacity: f32,
    pub selected: bool,
    pub cluster_selected: bool,
}

impl Cell {
    pub fn new(index: u32, name: String, width: u32, height: u32, config: &AtlasConfig) -> Self {
        let location = CellLocation::locate(index, config);
        Self {
            index,
            name,
            width,
            height,
            position: Vec3::ZERO,
            target: Vec3::ZERO,
            texture: CellTexture::Atlased {
                texture_index: location.texture_index,
                offset: location.offset,
            },
            grid: GridCoord::default(),
            opacity: 1.0,
            selected: false,
            cluster_selected: false,
        }
    }

    pub fn location(&self, config: &AtlasConfig) -> CellLocation {
        CellLocation::locate(self.index, config)
    }

    pub fn is_lod_active(&self) -> bool {
        matches!(self.texture, CellTexture::LodActive { .. })
    }

    /// Pixel offset inside whichever texture currently supplies the cell
    pub fn offset(&self) -> [u32; 2] {
        match self.texture {
            CellTexture::Atlased { offset, .. } => offset,
            CellTexture::LodActive { offset, .. } => offset,
        }
    }

    /// Pixel size of the region sampled for this cell
    pub fn source_size(&self) -> [u32; 2] {
        match self.texture {
            CellTexture::Atlased { .. } => [self.width, self.height],
            CellTexture::LodActive { size, .. } => size,
        }
    }

    /// Switch the cell to sample `size` pixels from a LOD texture slot.
    pub fn activate(&mut self, slot: SlotRect, size: [u32; 2], draw_calls: &mut DrawCalls) {
        self.texture = CellTexture::LodActive { offset: [slot.x, slot.y], size };
        self.push_texture_attributes(draw_calls);
    }

    /// Return the cell to its base-resolution atlas location.
    ///
    /// The location is recomputed from the index, so the restored values are
    /// identical to the ones the cell was built with.
    pub fn deactivate(&mut self, config: &AtlasConfig, draw_calls: &mut DrawCalls) {
        let location = self.location(config);
        self.texture = CellTexture::Atlased {
            texture_index: location.texture_index,
            offset: location.offset,
        };
        self.push_texture_attributes(draw_calls);
    }

    fn push_texture_attributes(&self, draw_calls: &mut DrawCalls) {
        draw_calls.set_cell_buffer(self, Attribute::TextureIndex);
        draw_calls.set_cell_buffer(self, Attribute::Offset);
        draw_calls.set_cell_buffer(self, Attribute::Size);
    }
}

/// Largest cell count whose picking colours are all distinct: 24 bits of
/// RGB minus the background.
pub const MAX_PICKABLE_CELLS: usize = 0xFF_FFFF;

/// Encode a cell index as an opaque RGB colour for GPU picking.
/// Zero is left for the background.
///
/// Only indices below [`MAX_PICKABLE_CELLS`] get a unique colour; higher
/// indices wrap onto lower ones. [`crate::cell::build_cells`] refuses
/// datasets that large.
pub fn picking_color(index: u32) -> [u8; 4] {
    let id = index.wrapping_add(1);
    [(id >> 16) as u8, (id >> 8) as u8, id as u8, 255]
}

/// Fail when `count` cells cannot all be told apart by [`picking_color`].
pub(crate) fn check_pickable(count: usize) -> Result<(), Error> {
    if count > MAX_PICKABLE_CELLS {
        return Err(Error::Manifest(format!(
            "{} images exceed the {} cells that can be picked by colour",
            count, MAX_PICKABLE_CELLS
        )));
    }
    Ok(())
}

/// Invert [`picking_color`]; `None` for the background colour.
pub fn cell_for_color(color: [u8; 4]) -> Option<u32> {
    let id = (color[0] as u32) << 16 | (color[1] as u32) << 8 | color[2] as u32;
    id.checked_sub(1)
}
