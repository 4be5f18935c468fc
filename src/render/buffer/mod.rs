//! Per-cell GPU attribute buffers

pub mod attributes;
pub mod draw_call;

pub use attributes::{Attribute, AttributeBuffer, LOD_TEXTURE_SENTINEL};
pub use draw_call::{DrawCall, DrawCalls};
