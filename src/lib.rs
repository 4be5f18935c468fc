//! Imagefield - level-of-detail texture streaming for point-cloud views of
//! large image collections

pub mod core;
pub mod render;
pub mod atlas;
pub mod cell;
pub mod layout;
pub mod streaming;
pub mod viewer;
