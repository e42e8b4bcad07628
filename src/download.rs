//! Remote artifact fetching for model and label files served over HTTP(S)
//!
//! Artifacts are downloaded once, then kept in an on-disk cache keyed by the
//! SHA-256 of their URL. Cache writes go through a temp file in the cache
//! directory and are persisted atomically.

use crate::error::{ClassifierError, Result};
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::io::StreamReader;

/// Environment variable overriding the artifact cache directory
pub const CACHE_DIR_ENV: &str = "MRI_CLASSIFY_CACHE_DIR";

/// HTTP artifact fetcher with an optional on-disk cache
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    client: Client,
    cache_dir: Option<PathBuf>,
}

impl ArtifactDownloader {
    /// Create a downloader caching into `cache_dir` (no cache when `None`)
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ClassifierError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache_dir })
    }

    /// Create a downloader that never touches the disk
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn without_cache() -> Result<Self> {
        Self::new(None)
    }

    /// XDG cache location, overridable with `MRI_CLASSIFY_CACHE_DIR`
    ///
    /// - Linux/macOS: `~/.cache/mri-classify/artifacts/`
    /// - Windows: `%LOCALAPPDATA%/mri-classify/artifacts/`
    #[must_use]
    pub fn default_cache_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
            return Some(PathBuf::from(dir).join("artifacts"));
        }
        dirs::cache_dir().map(|dir| dir.join("mri-classify").join("artifacts"))
    }

    /// Cache directory in use, if any
    #[must_use]
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Stable cache file name for a URL
    #[must_use]
    pub fn cache_key(url: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        let file_name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("artifact")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .collect::<String>();
        format!("{}-{}", digest.get(..16).unwrap_or(&digest), file_name)
    }

    /// Fetch an artifact, serving it from the cache when present
    ///
    /// # Errors
    /// - Network errors during download
    /// - Non-success HTTP status (reported as a load error)
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let cached_path = self
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(Self::cache_key(url)));

        if let Some(path) = cached_path.as_ref().filter(|p| p.is_file()) {
            log::debug!("Artifact cache hit: {} -> {}", url, path.display());
            return tokio::fs::read(path)
                .await
                .map_err(|e| ClassifierError::file_io_error("read cached artifact", path, &e));
        }

        log::info!("Downloading artifact: {}", url);
        let data = self.download(url).await?;

        if let Some(path) = cached_path {
            if let Err(e) = Self::store(&path, &data) {
                log::warn!("Failed to cache artifact {}: {}", url, e);
            }
        }

        Ok(data)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClassifierError::network_error(&format!("GET {}", url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::load(format!(
                "Failed to load {}: {}",
                url,
                status.as_u16()
            )));
        }

        let expected = response.content_length();
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let mut reader = StreamReader::new(Box::pin(stream));

        let capacity = expected.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
        let mut data = Vec::with_capacity(capacity);
        tokio::io::copy(&mut reader, &mut data)
            .await
            .map_err(|e| ClassifierError::network_error(&format!("Read body of {}", url), e))?;

        log::debug!("Downloaded {} bytes from {}", data.len(), url);
        Ok(data)
    }

    fn store(path: &Path, data: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| ClassifierError::internal("Cache path has no parent directory"))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| ClassifierError::file_io_error("create cache directory", dir, &e))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ClassifierError::file_io_error("create temp file in", dir, &e))?;
        temp.write_all(data)
            .map_err(|e| ClassifierError::file_io_error("write temp file for", path, &e))?;
        temp.persist(path)
            .map_err(|e| ClassifierError::file_io_error("persist cached artifact", path, &e.error))?;
        Ok(())
    }
}
