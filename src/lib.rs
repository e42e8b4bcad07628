#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # MRI Slice Classification Library
//!
//! Classifies a single brain MRI slice as tumor-like or clear with a pretrained
//! convolutional classifier, using ONNX Runtime or Tract as the execution
//! engine.
//!
//! The pipeline is a stateless transform from encoded image bytes to a
//! [`Prediction`]:
//!
//! 1. decode and cover-fit the image to 256x256 RGB
//! 2. normalize into a `[1, 3, 256, 256]` channel-first tensor (ImageNet mean/std)
//! 3. run the model and read its `logits` output
//! 4. softmax, pick the top class and attach summary text
//!
//! The model and label map are loaded lazily, once per [`ModelStore`], and
//! shared read-only by every concurrent analysis.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mri_classify::{ClassifierConfig, ImageClassifier, ModelSpec};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClassifierConfig::builder()
//!     .model_spec(ModelSpec::from_paths("model/brain_tumor.onnx", "model/class_map.json"))
//!     .build()?;
//! let classifier = ImageClassifier::new(config)?;
//!
//! let bytes = tokio::fs::read("slice.png").await?;
//! let prediction = classifier.analyze(&bytes).await?;
//! println!("{} ({:.1}%)", prediction.label(), prediction.confidence() * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA/CoreML providers
//! - `tract` (default): Pure Rust backend (WASM compatible)
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP image format support
//! - `tracing-json`, `tracing-files`: structured log outputs for the CLI
//!
//! To use only as a library without CLI dependencies:
//!
//! ```toml
//! [dependencies]
//! mri-classify = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod labels;
pub mod models;
pub mod postprocessing;
pub mod processor;
pub mod session_cache;
pub mod telemetry;
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;
use tokio::sync::OnceCell;

// Public API exports
pub use backends::*;
pub use config::{
    BackendType, ClassifierConfig, ClassifierConfigBuilder, ExecutionProvider, LoadFailurePolicy,
    ResampleFilter,
};
pub use download::ArtifactDownloader;
pub use error::{ClassifierError, ErrorKind, Result};
pub use inference::{BackendFactory, DefaultBackendFactory, InferenceBackend, ModelOutputs};
pub use labels::ClassLabelMap;
pub use models::{ArtifactSource, ModelInfo, ModelSpec};
pub use postprocessing::{
    argmax, softmax, ClassificationDecoder, PredictionPresenter, TriagePresenter,
};
pub use processor::{Analysis, ImageClassifier};
pub use session_cache::{LazyLoad, LoadedModel, ModelStore, ModelStoreStats};
pub use telemetry::{JsonLinesSink, NoOpSink, PredictionRecord, PredictionSink};
pub use types::{InputTensor, PixelGrid, Prediction, Presentation, ProcessingTimings};
pub use utils::{
    ExecutionProviderManager, ImageCrateDecoder, ImageDecoder, ImagePreprocessor,
    NumericValidator, ProviderInfo, TensorValidator,
};

#[cfg(feature = "cli")]
pub use tracing_config::{
    cli_tracing_config, init_cli_tracing, init_library_tracing, TracingConfig, TracingGuard,
};
pub use tracing_config::{events, spans, TracingFormat, TracingOutput};

static DEFAULT_CLASSIFIER: OnceCell<ImageClassifier> = OnceCell::const_new();

async fn default_classifier(config: &ClassifierConfig) -> Result<&'static ImageClassifier> {
    DEFAULT_CLASSIFIER
        .get_or_try_init(|| async { ImageClassifier::new(config.clone()) })
        .await
}

/// Classify image bytes with the process-wide default classifier
///
/// The first call builds the classifier from `config`; later calls reuse it
/// and its loaded model, ignoring their own `config`. Build an
/// [`ImageClassifier`] directly when several configurations are needed.
///
/// ```rust,no_run
/// use mri_classify::{analyze_bytes, ClassifierConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = ClassifierConfig::from_env()?;
/// let prediction = analyze_bytes(&upload, &config).await?;
/// println!("{}", serde_json::to_string(&prediction)?);
/// # Ok(())
/// # }
/// ```
pub async fn analyze_bytes(bytes: &[u8], config: &ClassifierConfig) -> Result<Prediction> {
    default_classifier(config).await?.analyze(bytes).await
}

/// Classify the contents of an async reader with the process-wide default classifier
///
/// See [`analyze_bytes`] for how `config` is applied.
pub async fn analyze_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &ClassifierConfig,
) -> Result<Prediction> {
    default_classifier(config)
        .await?
        .analyze_reader(reader)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_free_function_rejects_empty_input() {
        let config = ClassifierConfig::builder()
            .model_spec(ModelSpec::from_memory(
                b"graph".to_vec(),
                br#"{"classes": ["a", "b"]}"#.to_vec(),
            ))
            .build()
            .unwrap();

        let err = analyze_bytes(&[], &config).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Preprocessing(_)));
    }
}
