//! Full-resolution thumbnail fetching for LOD activation

use std::sync::Arc;

use image::RgbaImage;
use image::imageops::FilterType;
use tokio::runtime::Handle;

use crate::core::error::Error;
use crate::streaming::source::{ResourceSource, thumb_path};
use crate::streaming::worker::{Decoder, FetchEvent, FetchJob, FetchWorker};

/// Outcome of one thumbnail request
#[derive(Debug)]
pub struct ThumbnailResult {
    pub cell: u32,
    /// Cache generation the request was issued under
    pub generation: u64,
    pub image: Result<RgbaImage, Error>,
}

/// Asynchronous thumbnail fetching as seen by the LOD cache.
pub trait ThumbnailFetcher {
    /// Start fetching the image `name` for `cell`.
    fn request(&mut self, cell: u32, name: &str, generation: u64);

    /// Results that arrived since the last poll
    fn poll(&mut self) -> Vec<ThumbnailResult>;
}

#[derive(Clone, Copy, Debug)]
struct ThumbKey {
    cell: u32,
    generation: u64,
}

/// Decode an image and shrink it to fit a `max_px` square, keeping aspect.
pub fn decode_thumbnail(bytes: &[u8], max_px: u32) -> Result<RgbaImage, Error> {
    let image = image::load_from_memory(bytes)?;
    let image = if image.width() > max_px || image.height() > max_px {
        image.resize(max_px, max_px, FilterType::Triangle)
    } else {
        image
    };
    Ok(image.to_rgba8())
}

/// Thumbnail fetcher backed by a [`ResourceSource`] on a tokio runtime
pub struct ThumbnailLoader {
    worker: FetchWorker<ThumbKey>,
    thumbs_dir: String,
}

impl ThumbnailLoader {
    /// # Arguments
    /// * `runtime` - Runtime the fetches run on
    /// * `source` - Dataset source
    /// * `thumbs_dir` - Thumbnail directory relative to the dataset root
    /// * `lod_cell_px` - Decoded images are shrunk to fit this square
    /// * `max_concurrent` - Maximum number of fetches in flight
    pub fn new<S: ResourceSource>(
        runtime: &Handle,
        source: Arc<S>,
        thumbs_dir: impl Into<String>,
        lod_cell_px: u32,
        max_concurrent: usize,
    ) -> Self {
        let decoder: Decoder = Arc::new(move |bytes: Vec<u8>| decode_thumbnail(&bytes, lod_cell_px));
        Self {
            worker: FetchWorker::spawn(runtime, source, decoder, max_concurrent),
            thumbs_dir: thumbs_dir.into(),
        }
    }
}

impl ThumbnailFetcher for ThumbnailLoader {
    fn request(&mut self, cell: u32, name: &str, generation: u64) {
        let job = FetchJob {
            key: ThumbKey { cell, generation },
            paths: vec![thumb_path(&self.thumbs_dir, name)],
        };
        if !self.worker.submit(job) {
            log::error!("Thumbnail worker is gone; dropping request for cell {}", cell);
        }
    }

    fn poll(&mut self) -> Vec<ThumbnailResult> {
        self.worker
            .poll()
            .into_iter()
            .filter_map(|event| match event {
                FetchEvent::Finished { key, result } => Some(ThumbnailResult {
                    cell: key.cell,
                    generation: key.generation,
                    image: result,
                }),
                FetchEvent::Progress { .. } => None,
            })
            .collect()
    }
}
