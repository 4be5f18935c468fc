//! Interface to the scene renderer
//!
//! The engine never draws. It hands attribute buffers and texture pixels to
//! a [`Renderer`] implementation, which owns the GPU objects.

use image::RgbaImage;

use crate::cell::model::SlotRect;
use crate::render::buffer::{Attribute, DrawCall};

/// Texture a pixel upload is aimed at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Base-resolution texture canvas by ordinal
    Base(u32),
    /// Shared high-resolution LOD texture
    Lod,
}

/// Operations the engine requests from the rendering backend.
pub trait Renderer {
    /// Create GPU buffers for a draw call from its current attribute data.
    fn create_draw_call(&mut self, draw_call: &DrawCall);

    /// Re-upload one attribute buffer of a draw call.
    fn mark_attribute_dirty(&mut self, draw_call: u32, attribute: Attribute, data: &[u8]);

    /// Allocate an empty texture of the given size.
    fn allocate_texture(&mut self, target: TextureTarget, width: u32, height: u32);

    /// Upload a complete texture canvas.
    fn upload_texture(&mut self, target: TextureTarget, image: &RgbaImage);

    /// Copy `image` into the top-left of `rect` without re-uploading the
    /// rest of the texture.
    fn copy_region_into_texture(&mut self, target: TextureTarget, rect: SlotRect, image: &RgbaImage);

    /// Set the layout blend factor (0 = current positions, 1 = targets).
    fn set_transition_blend(&mut self, blend: f32);
}

/// A renderer call recorded by [`HeadlessRenderer`]
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOp {
    CreateDrawCall { index: u32, cells: usize },
    AttributeDirty { draw_call: u32, attribute: Attribute },
    AllocateTexture { target: TextureTarget, width: u32, height: u32 },
    UploadTexture { target: TextureTarget, width: u32, height: u32 },
    CopyRegion { target: TextureTarget, slot: u32, width: u32, height: u32 },
    Blend(f32),
}

/// Renderer that records calls instead of drawing.
///
/// Used for headless runs, tests and benchmarks.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    pub ops: Vec<RenderOp>,
    /// Disable recording, keeping only counters
    pub quiet: bool,
    pub uploaded_bytes: usize,
}

impl HeadlessRenderer {
    pub fn quiet() -> Self {
        Self { quiet: true, ..Default::default() }
    }

    fn record(&mut self, op: RenderOp) {
        if !self.quiet {
            self.ops.push(op);
        }
    }

    /// Recorded region copies into the LOD texture
    pub fn lod_copies(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, RenderOp::CopyRegion { target: TextureTarget::Lod, .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Renderer for HeadlessRenderer {
    fn create_draw_call(&mut self, draw_call: &DrawCall) {
        self.record(RenderOp::CreateDrawCall { index: draw_call.index, cells: draw_call.len() });
    }

    fn mark_attribute_dirty(&mut self, draw_call: u32, attribute: Attribute, data: &[u8]) {
        self.uploaded_bytes += data.len();
        self.record(RenderOp::AttributeDirty { draw_call, attribute });
    }

    fn allocate_texture(&mut self, target: TextureTarget, width: u32, height: u32) {
        self.record(RenderOp::AllocateTexture { target, width, height });
    }

    fn upload_texture(&mut self, target: TextureTarget, image: &RgbaImage) {
        self.uploaded_bytes += image.as_raw().len();
        self.record(RenderOp::UploadTexture { target, width: image.width(), height: image.height() });
    }

    fn copy_region_into_texture(&mut self, target: TextureTarget, rect: SlotRect, image: &RgbaImage) {
        self.uploaded_bytes += image.as_raw().len();
        self.record(RenderOp::CopyRegion {
            target,
            slot: rect.id,
            width: image.width(),
            height: image.height(),
        });
    }

    fn set_transition_blend(&mut self, blend: f32) {
        self.record(RenderOp::Blend(blend));
    }
}
