//! Model and label artifact sources
//!
//! A classifier needs two artifacts: the ONNX graph and the JSON label map.
//! Each one can live on disk, behind an HTTP(S) URL, or already in memory.

use crate::download::ArtifactDownloader;
use crate::error::{ClassifierError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default directory holding the model artifacts
pub const DEFAULT_MODEL_DIR: &str = "public/model";

/// Default model file name inside the model directory
pub const DEFAULT_MODEL_FILE: &str = "brain_tumor.onnx";

/// Default label map file name inside the model directory
pub const DEFAULT_LABELS_FILE: &str = "class_map.json";

/// Where an artifact's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Local file path
    Path(PathBuf),
    /// HTTP(S) URL fetched once and cached on disk
    Url(String),
    /// Bytes already held in memory
    Memory(Arc<[u8]>),
}

impl ArtifactSource {
    /// Parse a CLI/env argument: URLs become `Url`, anything else a `Path`
    #[must_use]
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }

    /// Resolve a file name relative to this source when it denotes a directory
    #[must_use]
    pub fn join(&self, file_name: &str) -> Self {
        match self {
            Self::Path(dir) => Self::Path(dir.join(file_name)),
            Self::Url(base) => Self::Url(format!("{}/{}", base.trim_end_matches('/'), file_name)),
            Self::Memory(bytes) => Self::Memory(Arc::clone(bytes)),
        }
    }

    /// Human-readable name for logs and errors
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Memory(bytes) => format!("<memory:{} bytes>", bytes.len()),
        }
    }

    /// Short name of the artifact (file name, last URL segment)
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            Self::Url(url) => url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(url)
                .to_string(),
            Self::Memory(_) => "memory".to_string(),
        }
    }

    /// Read the artifact bytes
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - HTTP failure or non-success status
    pub async fn fetch(&self, downloader: &ArtifactDownloader) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| ClassifierError::file_io_error("read artifact", path, &e)),
            Self::Url(url) => downloader.fetch(url).await,
            Self::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// The pair of artifacts a classifier is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// ONNX graph
    pub model: ArtifactSource,
    /// JSON label map
    pub labels: ArtifactSource,
}

impl ModelSpec {
    /// Both artifacts under one directory (or URL prefix) with default file names
    #[must_use]
    pub fn from_dir(dir: &ArtifactSource) -> Self {
        Self {
            model: dir.join(DEFAULT_MODEL_FILE),
            labels: dir.join(DEFAULT_LABELS_FILE),
        }
    }

    /// Both artifacts as local files
    #[must_use]
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(model: P, labels: Q) -> Self {
        Self {
            model: ArtifactSource::Path(model.as_ref().to_path_buf()),
            labels: ArtifactSource::Path(labels.as_ref().to_path_buf()),
        }
    }

    /// Both artifacts from in-memory bytes
    #[must_use]
    pub fn from_memory(model: impl Into<Arc<[u8]>>, labels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            model: ArtifactSource::Memory(model.into()),
            labels: ArtifactSource::Memory(labels.into()),
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::from_dir(&ArtifactSource::Path(PathBuf::from(DEFAULT_MODEL_DIR)))
    }
}

/// Metadata about a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Artifact name
    pub name: String,
    /// Size of the serialized graph
    pub size_bytes: u64,
    /// SHA-256 of the serialized graph
    pub sha256: String,
    /// Backend executing the graph
    pub backend: String,
    /// Input the tensor is bound to
    pub input_name: String,
    /// Declared graph outputs
    pub output_names: Vec<String>,
}

impl ModelInfo {
    /// Hex SHA-256 of artifact bytes
    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }
}
