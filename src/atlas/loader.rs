//! Background atlas fetching

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::cell::manifest::maybe_gunzip;
use crate::core::error::Error;
use crate::streaming::source::{ResourceSource, atlas_path};
use crate::streaming::worker::{Decoder, FetchEvent, FetchJob, FetchWorker};

/// Where atlas files live relative to the dataset root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasPaths {
    pub dir: String,
    /// File name pattern; `{index}` is replaced by the atlas index
    pub pattern: String,
    /// Tried once when the primary file fails
    pub fallback_pattern: Option<String>,
}

impl Default for AtlasPaths {
    fn default() -> Self {
        Self {
            dir: "atlases".into(),
            pattern: "atlas-{index}.jpg".into(),
            fallback_pattern: None,
        }
    }
}

impl AtlasPaths {
    /// Paths to try for `index`, primary first
    pub fn candidates(&self, index: usize) -> Vec<String> {
        let mut paths = vec![atlas_path(&self.dir, &self.pattern, index)];
        if let Some(fallback) = &self.fallback_pattern {
            paths.push(atlas_path(&self.dir, fallback, index));
        }
        paths
    }
}

/// Report from the atlas loader
#[derive(Debug)]
pub enum AtlasEvent {
    /// Download progress of one atlas, 0 to 100
    Progress { atlas: u32, percent: f32 },
    Loaded { atlas: u32, image: RgbaImage },
    Failed { atlas: u32, error: Error },
}

/// Decode an atlas payload, gunzipping it first when compressed.
pub fn decode_atlas(bytes: &[u8]) -> Result<RgbaImage, Error> {
    let bytes = maybe_gunzip(bytes)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Fetches every atlas of a dataset in the background.
pub struct AtlasLoader {
    worker: FetchWorker<u32>,
    paths: AtlasPaths,
    requested: usize,
}

impl AtlasLoader {
    /// # Arguments
    /// * `runtime` - Runtime the fetches run on
    /// * `source` - Dataset source
    /// * `paths` - Atlas location and file patterns
    /// * `max_concurrent` - Maximum number of fetches in flight
    pub fn new<S: ResourceSource>(runtime: &Handle, source: Arc<S>, paths: AtlasPaths, max_concurrent: usize) -> Self {
        let decoder: Decoder = Arc::new(|bytes: Vec<u8>| decode_atlas(&bytes));
        Self {
            worker: FetchWorker::spawn(runtime, source, decoder, max_concurrent),
            paths,
            requested: 0,
        }
    }

    /// Queue every atlas in index order.
    pub fn request_all(&mut self, atlas_count: usize) {
        for index in 0..atlas_count {
            let job = FetchJob { key: index as u32, paths: self.paths.candidates(index) };
            if !self.worker.submit(job) {
                log::error!("Atlas worker is gone; {} atlases not requested", atlas_count - index);
                return;
            }
        }
        self.requested += atlas_count;
        log::info!("Requested {} atlases from {}/", atlas_count, self.paths.dir);
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Drain events available right now.
    pub fn poll_events(&mut self) -> Vec<AtlasEvent> {
        self.worker.poll().into_iter().map(convert).collect()
    }

    /// Wait for the next event. Returns `None` once the worker is gone.
    pub async fn next_event(&mut self) -> Option<AtlasEvent> {
        self.worker.next_event().await.map(convert)
    }
}

fn convert(event: FetchEvent<u32>) -> AtlasEvent {
    match event {
        FetchEvent::Progress { key, loaded, total } => {
            let percent = match total {
                Some(total) if total > 0 => loaded as f32 / total as f32 * 100.0,
                _ => 0.0,
            };
            AtlasEvent::Progress { atlas: key, percent }
        }
        FetchEvent::Finished { key, result: Ok(image) } => AtlasEvent::Loaded { atlas: key, image },
        FetchEvent::Finished { key, result: Err(error) } => AtlasEvent::Failed { atlas: key, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::source::LocalSource;
    use flate2::{Compression, write::GzEncoder};
    use std::io::{Cursor, Write};

    fn png(shade: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(4, 4, image::Rgba([shade, 0, 0, 255]))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    async fn collect_finished(loader: &mut AtlasLoader, count: usize) -> Vec<AtlasEvent> {
        let mut finished = Vec::new();
        while finished.len() < count {
            match loader.next_event().await {
                Some(AtlasEvent::Progress { .. }) => {}
                Some(event) => finished.push(event),
                None => break,
            }
        }
        finished
    }

    #[test]
    fn test_candidates() {
        let paths = AtlasPaths { fallback_pattern: Some("atlas-{index}.jpg.gz".into()), ..Default::default() };
        assert_eq!(paths.candidates(2), vec!["atlases/atlas-2.jpg", "atlases/atlas-2.jpg.gz"]);
    }

    #[test]
    fn test_decode_gzip_payload() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&png(9)).unwrap();
        let image = decode_atlas(&encoder.finish().unwrap()).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [9, 0, 0, 255]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loads_all_atlases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("atlases")).unwrap();
        for i in 0..3u8 {
            std::fs::write(dir.path().join(format!("atlases/atlas-{}.jpg", i)), png(i)).unwrap();
        }

        let source = Arc::new(LocalSource::new(dir.path()));
        let mut loader = AtlasLoader::new(&Handle::current(), source, AtlasPaths::default(), 2);
        loader.request_all(3);

        let mut loaded: Vec<u32> = collect_finished(&mut loader, 3)
            .await
            .into_iter()
            .map(|event| match event {
                AtlasEvent::Loaded { atlas, .. } => atlas,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        loaded.sort();
        assert_eq!(loaded, vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fallback_then_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("atlases")).unwrap();
        std::fs::write(dir.path().join("atlases/atlas-0.png"), png(5)).unwrap();

        let paths = AtlasPaths { fallback_pattern: Some("atlas-{index}.png".into()), ..Default::default() };
        let source = Arc::new(LocalSource::new(dir.path()));
        let mut loader = AtlasLoader::new(&Handle::current(), source, paths, 1);
        loader.request_all(2);

        let mut events = collect_finished(&mut loader, 2).await;
        events.sort_by_key(|event| match event {
            AtlasEvent::Loaded { atlas, .. } | AtlasEvent::Failed { atlas, .. } | AtlasEvent::Progress { atlas, .. } => *atlas,
        });
        assert!(matches!(events[0], AtlasEvent::Loaded { atlas: 0, .. }));
        assert!(matches!(events[1], AtlasEvent::Failed { atlas: 1, .. }));
    }
}
