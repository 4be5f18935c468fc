//! Partitioning of cells into fixed-capacity draw calls

use std::ops::Range;

use rayon::prelude::*;

use crate::atlas::config::AtlasConfig;
use crate::cell::location::CellLocation;
use crate::cell::model::{Cell, CellTexture, picking_color};
use crate::render::buffer::attributes::{Attribute, AttributeBuffer, LOD_TEXTURE_SENTINEL};
use crate::render::renderer::Renderer;

/// One instanced point submission covering a contiguous slice of cells.
#[derive(Clone, Debug)]
pub struct DrawCall {
    /// Partition ordinal
    pub index: u32,
    /// Global index of the first owned cell
    pub first_cell: u32,
    /// Textures bound to this call's sampler array, in order
    pub textures: Range<u32>,
    buffers: Vec<AttributeBuffer>,
    dirty: u16,
}

impl DrawCall {
    fn build(index: u32, cells: &[Cell], config: &AtlasConfig) -> Self {
        let first_cell = index * config.max_cells_per_draw_call;
        let first_texture = CellLocation::locate(first_cell, config).texture_index;
        let last_texture = cells
            .last()
            .map(|c| c.location(config).texture_index)
            .unwrap_or(first_texture);

        let mut call = Self {
            index,
            first_cell,
            textures: first_texture..last_texture + 1,
            buffers: Attribute::ALL.iter().map(|&a| AttributeBuffer::new(a, cells.len())).collect(),
            dirty: 0,
        };
        for cell in cells {
            for attribute in Attribute::ALL {
                call.write_cell(cell, attribute);
            }
        }
        call
    }

    /// Number of cells owned by this call
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self, attribute: Attribute) -> &AttributeBuffer {
        &self.buffers[attribute as usize]
    }

    pub fn is_dirty(&self, attribute: Attribute) -> bool {
        self.dirty & attribute.bit() != 0
    }

    /// Attributes awaiting upload
    pub fn dirty_attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        Attribute::ALL.into_iter().filter(|&a| self.is_dirty(a))
    }

    fn write_cell(&mut self, cell: &Cell, attribute: Attribute) {
        let slot = (cell.index - self.first_cell) as usize;
        let first_texture = self.textures.start;
        let buffer = &mut self.buffers[attribute as usize];
        match attribute {
            Attribute::Position => buffer.write_f32(slot, &cell.position.to_array()),
            Attribute::Target => buffer.write_f32(slot, &cell.target.to_array()),
            Attribute::Size => {
                let [w, h] = cell.source_size();
                buffer.write_f32(slot, &[w as f32, h as f32]);
            }
            Attribute::Offset => {
                let [x, y] = cell.offset();
                buffer.write_f32(slot, &[x as f32, y as f32]);
            }
            Attribute::TextureIndex => {
                let ordinal = match cell.texture {
                    CellTexture::Atlased { texture_index, .. } => (texture_index - first_texture) as i32,
                    CellTexture::LodActive { .. } => LOD_TEXTURE_SENTINEL,
                };
                buffer.write_i32(slot, &[ordinal]);
            }
            Attribute::Color => buffer.write_u8(slot, &picking_color(cell.index)),
            Attribute::Opacity => buffer.write_f32(slot, &[cell.opacity]),
            Attribute::Selected => buffer.write_f32(slot, &[cell.selected as u8 as f32]),
            Attribute::ClusterSelected => buffer.write_f32(slot, &[cell.cluster_selected as u8 as f32]),
        }
        self.dirty |= attribute.bit();
    }
}

/// All draw calls of the scene, indexed by partition ordinal.
#[derive(Clone, Debug, Default)]
pub struct DrawCalls {
    calls: Vec<DrawCall>,
    capacity: u32,
}

impl DrawCalls {
    /// Group cells by draw call and build every attribute buffer.
    ///
    /// `cells` must be in global index order, as produced by
    /// [`crate::cell::build_cells`].
    pub fn partition_for_render(cells: &[Cell], config: &AtlasConfig) -> Self {
        let capacity = config.max_cells_per_draw_call;
        let mut calls: Vec<DrawCall> = cells
            .par_chunks(capacity as usize)
            .enumerate()
            .map(|(i, chunk)| DrawCall::build(i as u32, chunk, config))
            .collect();
        // Freshly built buffers are uploaded whole on registration
        for call in &mut calls {
            call.dirty = 0;
        }
        log::info!("Partitioned {} cells into {} draw calls", cells.len(), calls.len());
        Self { calls, capacity }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DrawCall> {
        self.calls.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCall> {
        self.calls.iter()
    }

    /// Rewrite one cell's value of one attribute and mark it for upload.
    ///
    /// Constant time; never reallocates. Writing the same value twice leaves
    /// the buffer unchanged.
    pub fn set_cell_buffer(&mut self, cell: &Cell, attribute: Attribute) {
        if self.capacity == 0 {
            return;
        }
        match self.calls.get_mut((cell.index / self.capacity) as usize) {
            Some(call) => call.write_cell(cell, attribute),
            None => log::warn!("Cell {} is outside every draw call", cell.index),
        }
    }

    /// Bytes of one cell's value, for inspection
    pub fn attribute_bytes(&self, cell_index: u32, attribute: Attribute) -> &[u8] {
        let call = &self.calls[(cell_index / self.capacity) as usize];
        call.buffer(attribute).slot_bytes((cell_index - call.first_cell) as usize)
    }

    /// Shader texture ordinal currently stored for a cell
    pub fn texture_index_of(&self, cell_index: u32) -> i32 {
        let bytes = self.attribute_bytes(cell_index, Attribute::TextureIndex);
        i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Hand every draw call to the renderer.
    pub fn register(&self, renderer: &mut dyn Renderer) {
        for call in &self.calls {
            renderer.create_draw_call(call);
        }
    }

    /// Upload every dirty attribute buffer; returns the number uploaded.
    pub fn flush(&mut self, renderer: &mut dyn Renderer) -> usize {
        let mut uploaded = 0;
        for call in &mut self.calls {
            if call.dirty == 0 {
                continue;
            }
            for attribute in Attribute::ALL {
                if call.is_dirty(attribute) {
                    renderer.mark_attribute_dirty(call.index, attribute, call.buffer(attribute).as_bytes());
                    uploaded += 1;
                }
            }
            call.dirty = 0;
        }
        uploaded
    }
}
