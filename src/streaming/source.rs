//! Byte sources for manifests, atlases, layouts and thumbnails
//!
//! Paths are relative to the dataset root (`manifest.json`,
//! `atlases/atlas-0.jpg`, `thumbs/cat.jpg`, ...). A source resolves them
//! against its own root, either a base URL or a local directory.

use std::future::Future;
use std::path::PathBuf;

use tokio::io::AsyncReadExt;

use crate::core::error::Error;

/// Size of the read buffer used by [`LocalSource`]
const READ_CHUNK: usize = 64 * 1024;

/// Progress callback: `(loaded_bytes, total_bytes)`
pub type Progress<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// Fetches raw bytes by dataset-relative path.
pub trait ResourceSource: Send + Sync + 'static {
    /// Fetch `path`, reporting progress as chunks arrive.
    fn fetch(&self, path: &str, progress: Progress<'_>) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;

    /// Fetch without progress reporting.
    fn fetch_bytes(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, Error>> + Send {
        async move {
            let mut ignore = |_: u64, _: Option<u64>| {};
            self.fetch(path, &mut ignore).await
        }
    }
}

/// Join a root and a relative path with exactly one separator.
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Path of an atlas image under the dataset root
pub fn atlas_path(atlas_dir: &str, pattern: &str, index: usize) -> String {
    let file = pattern.replace("{index}", &index.to_string());
    if atlas_dir.is_empty() {
        file
    } else {
        join_url(atlas_dir, &file)
    }
}

/// Path of a full-resolution thumbnail under the dataset root
pub fn thumb_path(thumbs_dir: &str, image: &str) -> String {
    join_url(thumbs_dir, image)
}

/// Source backed by an HTTP server
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

impl ResourceSource for HttpSource {
    async fn fetch(&self, path: &str, progress: Progress<'_>) -> Result<Vec<u8>, Error> {
        let url = join_url(&self.base_url, path);
        let failed = |reason: String| Error::Fetch { url: url.clone(), reason };

        let mut response = self.client.get(&url).send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let total = response.content_length();
        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            bytes.extend_from_slice(&chunk);
            progress(bytes.len() as u64, total);
        }
        log::trace!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }
}

/// Source backed by a local directory
#[derive(Clone, Debug)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl ResourceSource for LocalSource {
    async fn fetch(&self, path: &str, progress: Progress<'_>) -> Result<Vec<u8>, Error> {
        let full = self.root.join(path.trim_start_matches('/'));
        let failed = |e: std::io::Error| Error::Fetch { url: full.display().to_string(), reason: e.to_string() };

        let mut file = tokio::fs::File::open(&full).await.map_err(failed)?;
        let total = file.metadata().await.ok().map(|m| m.len());
        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut buf).await.map_err(failed)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..n]);
            progress(bytes.len() as u64, total);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(atlas_path("atlases", "atlas-{index}.jpg", 3), "atlases/atlas-3.jpg");
        assert_eq!(atlas_path("", "atlas-{index}.jpg", 0), "atlas-0.jpg");
        assert_eq!(thumb_path("thumbs/", "cat.jpg"), "thumbs/cat.jpg");
        assert_eq!(join_url("http://host/data/", "/manifest.json"), "http://host/data/manifest.json");
    }

    #[tokio::test]
    async fn test_local_fetch_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![7u8; READ_CHUNK + 10];
        std::fs::write(dir.path().join("blob.bin"), &payload).unwrap();

        let source = LocalSource::new(dir.path());
        let mut reports = Vec::new();
        let mut progress = |loaded: u64, total: Option<u64>| reports.push((loaded, total));
        let bytes = source.fetch("blob.bin", &mut progress).await.unwrap();

        assert_eq!(bytes, payload);
        let total = Some(payload.len() as u64);
        assert_eq!(reports.last(), Some(&(payload.len() as u64, total)));
        assert!(reports.len() >= 2);
    }

    #[tokio::test]
    async fn test_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalSource::new(dir.path());
        let result = source.fetch_bytes("nope.jpg").await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }
}
