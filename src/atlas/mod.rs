//! Atlas and texture loading
//!
//! Atlases are fetched eagerly at startup; each finished atlas is drawn into
//! the canvas of the texture that owns it, and a texture is handed to the
//! renderer once every one of its atlases has arrived.

pub mod config;
pub mod texture;
pub mod loader;

pub use config::{AtlasConfig, AtlasSizes};
pub use texture::{Atlas, Texture, TextureSet};
pub use loader::{AtlasEvent, AtlasLoader, AtlasPaths};
