//! Rendering interfaces and GPU-facing data

pub mod caps;
pub mod buffer;
pub mod renderer;

pub use caps::Capabilities;
pub use renderer::{HeadlessRenderer, RenderOp, Renderer, TextureTarget};
