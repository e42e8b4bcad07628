//! Configuration types for classification operations

use crate::error::{ClassifierError, Result};
use crate::models::{ArtifactSource, ModelSpec};
use crate::utils::NumericValidator;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming a directory (or URL prefix) with both artifacts
pub const MODEL_DIR_ENV: &str = "MRI_CLASSIFY_MODEL_DIR";
/// Environment variable naming the model artifact
pub const MODEL_ENV: &str = "MRI_CLASSIFY_MODEL";
/// Environment variable naming the label artifact
pub const LABELS_ENV: &str = "MRI_CLASSIFY_LABELS";
/// Environment variable holding a `backend:provider` string
pub const BACKEND_ENV: &str = "MRI_CLASSIFY_BACKEND";
/// Environment variable naming a JSON-lines prediction log
pub const PREDICTION_LOG_ENV: &str = "MRI_CLASSIFY_PREDICTION_LOG";

/// Name of the graph output holding class logits
pub const DEFAULT_LOGITS_OUTPUT: &str = "logits";

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    Auto,
    /// CPU execution (always available)
    #[default]
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, WASM compatible)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") || !cfg!(feature = "tract") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// What happens on later calls after a failed artifact load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoadFailurePolicy {
    /// Leave the cache empty; the next caller attempts the load again
    #[default]
    Retry,
    /// Remember the first failure and return it forever
    Sticky,
}

/// Resampling kernel used by the cover-fit resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    #[must_use]
    pub fn to_filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for the classification pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Model and label artifacts
    pub model_spec: ModelSpec,
    /// Inference backend
    pub backend_type: BackendType,
    /// Execution provider (ONNX Runtime only)
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
    /// Graph input to bind the tensor to (`None` = first declared input)
    pub input_name: Option<String>,
    /// Graph output holding class logits
    pub logits_output: String,
    /// Resize kernel
    pub resample_filter: ResampleFilter,
    /// Failed-load caching behaviour
    pub load_failure_policy: LoadFailurePolicy,
    /// Directory caching artifacts fetched over HTTP (`None` = default location)
    pub artifact_cache_dir: Option<PathBuf>,
    /// Append each prediction to this JSON-lines file
    pub prediction_log: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            input_name: None,
            logits_output: DEFAULT_LOGITS_OUTPUT.to_string(),
            resample_filter: ResampleFilter::default(),
            load_failure_policy: LoadFailurePolicy::default(),
            artifact_cache_dir: None,
            prediction_log: None,
        }
    }
}

impl ClassifierConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder::default()
    }

    /// Builder seeded with this configuration
    #[must_use]
    pub fn into_builder(self) -> ClassifierConfigBuilder {
        ClassifierConfigBuilder { config: self }
    }

    /// Build a configuration from `MRI_CLASSIFY_*` environment variables
    ///
    /// # Errors
    /// - `MRI_CLASSIFY_BACKEND` is not a valid `backend:provider` string
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(dir) = lookup(MODEL_DIR_ENV) {
            builder = builder.model_dir(ArtifactSource::parse(&dir));
        }
        if let Some(model) = lookup(MODEL_ENV) {
            builder = builder.model(ArtifactSource::parse(&model));
        }
        if let Some(labels) = lookup(LABELS_ENV) {
            builder = builder.labels(ArtifactSource::parse(&labels));
        }
        if let Some(backend) = lookup(BACKEND_ENV) {
            let (backend_type, provider) =
                crate::utils::ExecutionProviderManager::parse_provider_string(&backend)?;
            builder = builder
                .backend_type(backend_type)
                .execution_provider(provider);
        }
        if let Some(path) = lookup(crate::download::CACHE_DIR_ENV) {
            builder = builder.artifact_cache_dir(PathBuf::from(path).join("artifacts"));
        }
        if let Some(path) = lookup(PREDICTION_LOG_ENV) {
            builder = builder.prediction_log(path);
        }

        builder.build()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Empty logits output name
    /// - Thread counts above the supported maximum
    /// - Empty input name override
    /// - Tract backend combined with a non-CPU provider
    pub fn validate(&self) -> Result<()> {
        if self.logits_output.trim().is_empty() {
            return Err(ClassifierError::invalid_config(
                "Logits output name must not be empty",
            ));
        }

        NumericValidator::validate_thread_count(self.intra_threads)?;
        NumericValidator::validate_thread_count(self.inter_threads)?;

        if let Some(name) = &self.input_name {
            if name.trim().is_empty() {
                return Err(ClassifierError::invalid_config(
                    "Input name override must not be empty",
                ));
            }
        }

        if self.backend_type == BackendType::Tract
            && !matches!(
                self.execution_provider,
                ExecutionProvider::Cpu | ExecutionProvider::Auto
            )
        {
            return Err(ClassifierError::invalid_config(format!(
                "Tract backend only supports the cpu provider, got {}",
                self.execution_provider
            )));
        }

        Ok(())
    }
}

/// Builder for `ClassifierConfig`
#[derive(Debug, Default)]
pub struct ClassifierConfigBuilder {
    config: ClassifierConfig,
}

impl ClassifierConfigBuilder {
    /// Set both artifacts at once
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    /// Use `brain_tumor.onnx` and `class_map.json` under `dir`
    #[must_use]
    pub fn model_dir(mut self, dir: ArtifactSource) -> Self {
        self.config.model_spec = ModelSpec::from_dir(&dir);
        self
    }

    /// Set the model artifact
    #[must_use]
    pub fn model(mut self, model: ArtifactSource) -> Self {
        self.config.model_spec.model = model;
        self
    }

    /// Set the label artifact
    #[must_use]
    pub fn labels(mut self, labels: ArtifactSource) -> Self {
        self.config.model_spec.labels = labels;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Set both thread counts; intra gets `threads`, inter gets a quarter of it
    #[must_use]
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = if threads > 0 { (threads / 4).max(1) } else { 0 };
        self
    }

    #[must_use]
    pub fn input_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.input_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn logits_output<S: Into<String>>(mut self, name: S) -> Self {
        self.config.logits_output = name.into();
        self
    }

    #[must_use]
    pub fn resample_filter(mut self, filter: ResampleFilter) -> Self {
        self.config.resample_filter = filter;
        self
    }

    #[must_use]
    pub fn load_failure_policy(mut self, policy: LoadFailurePolicy) -> Self {
        self.config.load_failure_policy = policy;
        self
    }

    #[must_use]
    pub fn artifact_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.artifact_cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn prediction_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.prediction_log = Some(path.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any failure reported by [`ClassifierConfig::validate`]
    pub fn build(self) -> Result<ClassifierConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ClassifierConfig::default();
        assert_eq!(config.logits_output, "logits");
        assert_eq!(config.input_name, None);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.resample_filter, ResampleFilter::Lanczos3);
        assert_eq!(config.load_failure_policy, LoadFailurePolicy::Retry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_chaining() {
        let config = ClassifierConfig::builder()
            .model_dir(ArtifactSource::parse("/srv/model"))
            .backend_type(BackendType::Tract)
            .execution_provider(ExecutionProvider::Cpu)
            .num_threads(8)
            .input_name("input")
            .logits_output("scores")
            .resample_filter(ResampleFilter::Triangle)
            .load_failure_policy(LoadFailurePolicy::Sticky)
            .build()
            .unwrap();

        assert_eq!(
            config.model_spec.model,
            ArtifactSource::Path(PathBuf::from("/srv/model/brain_tumor.onnx"))
        );
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 2);
        assert_eq!(config.input_name.as_deref(), Some("input"));
        assert_eq!(config.logits_output, "scores");
        assert_eq!(config.load_failure_policy, LoadFailurePolicy::Sticky);
    }

    #[test]
    fn test_config_validation_errors() {
        let result = ClassifierConfig::builder().logits_output("  ").build();
        assert!(matches!(result, Err(ClassifierError::InvalidConfig(_))));

        let result = ClassifierConfig::builder().input_name("").build();
        assert!(matches!(result, Err(ClassifierError::InvalidConfig(_))));

        let result = ClassifierConfig::builder()
            .backend_type(BackendType::Tract)
            .execution_provider(ExecutionProvider::Cuda)
            .build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Tract"));
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let mut env = HashMap::new();
        env.insert(MODEL_DIR_ENV, "https://cdn.example.com/model");
        env.insert(LABELS_ENV, "/etc/mri/class_map.json");
        env.insert(BACKEND_ENV, "tract:cpu");
        env.insert(PREDICTION_LOG_ENV, "/var/log/predictions.jsonl");

        let config =
            ClassifierConfig::from_lookup(|key| env.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(
            config.model_spec.model,
            ArtifactSource::Url("https://cdn.example.com/model/brain_tumor.onnx".to_string())
        );
        assert_eq!(
            config.model_spec.labels,
            ArtifactSource::Path(PathBuf::from("/etc/mri/class_map.json"))
        );
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(
            config.prediction_log,
            Some(PathBuf::from("/var/log/predictions.jsonl"))
        );
    }

    #[test]
    fn test_from_lookup_rejects_bad_backend() {
        let result = ClassifierConfig::from_lookup(|key| {
            (key == BACKEND_ENV).then(|| "tensorflow:gpu".to_string())
        });
        assert!(matches!(result, Err(ClassifierError::InvalidConfig(_))));
    }

    #[test]
    fn test_enum_serde() {
        let json = serde_json::to_string(&LoadFailurePolicy::Sticky).unwrap();
        assert_eq!(json, "\"Sticky\"");
        let provider: ExecutionProvider = serde_json::from_str("\"CoreMl\"").unwrap();
        assert_eq!(provider, ExecutionProvider::CoreMl);
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(BackendType::Tract.to_string(), "tract");
    }
}
