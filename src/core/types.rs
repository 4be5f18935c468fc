//! Core type re-exports

pub use glam::{Vec2, Vec3};
