//! Process-lifetime caches for the loaded model and label map
//!
//! [`LazyLoad`] is a one-shot initializer: the first caller runs the load and
//! every concurrent caller awaits that same in-flight load. Failure handling
//! follows [`LoadFailurePolicy`]. [`ModelStore`] holds one cache for the
//! inference backend and one for the label map.

use crate::config::{ClassifierConfig, LoadFailurePolicy};
use crate::download::ArtifactDownloader;
use crate::error::{ClassifierError, Result};
use crate::inference::{BackendFactory, InferenceBackend};
use crate::labels::ClassLabelMap;
use crate::models::{ArtifactSource, ModelInfo};
use instant::Instant;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// Single-initialization cache shared by all callers
pub struct LazyLoad<T: ?Sized> {
    name: &'static str,
    policy: LoadFailurePolicy,
    cell: OnceCell<Arc<T>>,
    sticky_failure: OnceLock<String>,
    attempts: AtomicUsize,
}

impl<T: ?Sized> std::fmt::Debug for LazyLoad<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLoad")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("loaded", &self.cell.initialized())
            .field("sticky_failure", &self.sticky_failure.get())
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: ?Sized> LazyLoad<T> {
    #[must_use]
    pub fn new(name: &'static str, policy: LoadFailurePolicy) -> Self {
        Self {
            name,
            policy,
            cell: OnceCell::new(),
            sticky_failure: OnceLock::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Return the cached value, loading it on first use
    ///
    /// Any failure from `load` is surfaced as [`ClassifierError::Load`].
    ///
    /// # Errors
    /// - The load failed (this call's attempt, or the recorded one under `Sticky`)
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>>>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(Arc::clone(value));
        }
        if let Some(message) = self.sticky_failure.get() {
            return Err(ClassifierError::load(message.clone()));
        }

        let value = self
            .cell
            .get_or_try_init(|| async move {
                // A waiter may get here after the in-flight load failed
                if let Some(message) = self.sticky_failure.get() {
                    return Err(ClassifierError::load(message.clone()));
                }

                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(cache = self.name, attempt, "loading");

                match load().await {
                    Ok(value) => Ok(value),
                    Err(e) => {
                        let e = e.into_load_error(self.name);
                        tracing::warn!(cache = self.name, error = %e, "load failed");
                        if self.policy == LoadFailurePolicy::Sticky {
                            if let ClassifierError::Load(message) = &e {
                                let _ = self.sticky_failure.set(message.clone());
                            }
                        }
                        Err(e)
                    },
                }
            })
            .await?;

        Ok(Arc::clone(value))
    }

    /// The cached value, if a load has succeeded
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().map(Arc::clone)
    }

    /// Number of load attempts made so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether a value is cached
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

/// Loaded backend together with its artifact metadata
#[derive(Debug)]
pub struct LoadedModel {
    pub backend: Arc<dyn InferenceBackend>,
    pub info: ModelInfo,
}

/// Load counters exposed for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStoreStats {
    pub model_load_attempts: usize,
    pub label_load_attempts: usize,
    pub model_loaded: bool,
    pub labels_loaded: bool,
}

/// Shared, read-only-after-load holder of the model session and label map
pub struct ModelStore {
    config: ClassifierConfig,
    factory: Arc<dyn BackendFactory>,
    downloader: ArtifactDownloader,
    model: LazyLoad<LoadedModel>,
    labels: LazyLoad<ClassLabelMap>,
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("model_spec", &self.config.model_spec)
            .field("backend_type", &self.config.backend_type)
            .field("model", &self.model)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl ModelStore {
    /// Create a store; nothing is loaded until first use
    ///
    /// # Errors
    /// - Failed to create the HTTP client for URL artifacts
    pub fn new(config: ClassifierConfig, factory: Arc<dyn BackendFactory>) -> Result<Self> {
        let cache_dir = config
            .artifact_cache_dir
            .clone()
            .or_else(ArtifactDownloader::default_cache_dir);
        let downloader = ArtifactDownloader::new(cache_dir)?;
        let policy = config.load_failure_policy;

        Ok(Self {
            config,
            factory,
            downloader,
            model: LazyLoad::new("model", policy),
            labels: LazyLoad::new("label map", policy),
        })
    }

    /// Ready-to-run inference backend, loaded once per store
    ///
    /// # Errors
    /// - Model artifact missing, unreadable or not a valid graph (`Load`)
    pub async fn get_session(&self) -> Result<Arc<dyn InferenceBackend>> {
        let loaded = self.loaded_model().await?;
        Ok(Arc::clone(&loaded.backend))
    }

    /// Loaded backend with metadata
    ///
    /// # Errors
    /// - See [`ModelStore::get_session`]
    pub async fn loaded_model(&self) -> Result<Arc<LoadedModel>> {
        self.model.get_or_load(|| self.load_model()).await
    }

    /// Ordered class labels, loaded once per store
    ///
    /// # Errors
    /// - Label artifact missing, unreadable or not matching the schema (`Load`)
    pub async fn get_class_names(&self) -> Result<Arc<ClassLabelMap>> {
        self.labels.get_or_load(|| self.load_labels()).await
    }

    /// Metadata of the loaded model, if loaded
    #[must_use]
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.model.get().map(|loaded| loaded.info.clone())
    }

    #[must_use]
    pub fn stats(&self) -> ModelStoreStats {
        ModelStoreStats {
            model_load_attempts: self.model.attempts(),
            label_load_attempts: self.labels.attempts(),
            model_loaded: self.model.is_loaded(),
            labels_loaded: self.labels.is_loaded(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    async fn fetch(&self, source: &ArtifactSource) -> Result<Vec<u8>> {
        source
            .fetch(&self.downloader)
            .await
            .map_err(|e| e.into_load_error(&source.display_name()))
    }

    async fn load_model(&self) -> Result<Arc<LoadedModel>> {
        let load_start = Instant::now();
        let source = &self.config.model_spec.model;
        tracing::info!(model = %source.display_name(), backend = %self.config.backend_type, "loading model");

        let data = self.fetch(source).await?;
        let size_bytes = data.len() as u64;
        let sha256 = ModelInfo::hash_bytes(&data);

        let factory = Arc::clone(&self.factory);
        let config = self.config.clone();
        let backend_type = config.backend_type;
        let backend = tokio::task::spawn_blocking(move || {
            factory.create_backend(backend_type, &data, &config)
        })
        .await
        .map_err(|e| ClassifierError::internal(format!("Model loading task failed: {}", e)))?
        .map_err(|e| e.into_load_error(&source.display_name()))?;

        let backend: Arc<dyn InferenceBackend> = Arc::from(backend);
        let info = ModelInfo {
            name: source.file_name(),
            size_bytes,
            sha256,
            backend: backend.name().to_string(),
            input_name: backend.input_name().to_string(),
            output_names: backend.output_names(),
        };

        tracing::info!(
            model = %info.name,
            size_bytes = info.size_bytes,
            backend = %info.backend,
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "model ready"
        );

        Ok(Arc::new(LoadedModel { backend, info }))
    }

    async fn load_labels(&self) -> Result<Arc<ClassLabelMap>> {
        let source = &self.config.model_spec.labels;
        tracing::info!(labels = %source.display_name(), "loading label map");

        let data = self.fetch(source).await?;
        let labels = ClassLabelMap::from_json_slice(&data)
            .map_err(|e| e.into_load_error(&source.display_name()))?;

        tracing::info!(classes = labels.len(), "label map ready");
        Ok(Arc::new(labels))
    }
}
