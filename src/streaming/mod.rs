//! Resource fetching and level-of-detail streaming

pub mod budget;
pub mod cache;
pub mod grid;
pub mod lod;
pub mod slots;
pub mod source;
pub mod thumbs;
pub mod worker;

pub use budget::MemoryBudget;
pub use cache::ImageCache;
pub use grid::{GridCoord, LodGrid};
pub use lod::{LodCache, LodConfig, LodFrameStats, LodScene};
pub use slots::SlotTable;
pub use source::{HttpSource, LocalSource, Progress, ResourceSource, atlas_path, thumb_path};
pub use thumbs::{ThumbnailFetcher, ThumbnailLoader, ThumbnailResult, decode_thumbnail};
pub use worker::{Decoder, FetchEvent, FetchJob, FetchWorker};
