//! The classification pipeline
//!
//! [`ImageClassifier`] wires the capability seams together: an
//! [`ImageDecoder`] turns bytes into a pixel grid, the shared [`ModelStore`]
//! supplies the backend and label map, and a [`PredictionPresenter`] phrases
//! the result. The four stages run strictly in sequence for each call; many
//! calls may run at once against the same store.

use crate::{
    config::ClassifierConfig,
    error::{ClassifierError, Result},
    inference::{BackendFactory, DefaultBackendFactory, InferenceBackend, ModelOutputs},
    labels::ClassLabelMap,
    models::ModelInfo,
    postprocessing::{ClassificationDecoder, PredictionPresenter, TriagePresenter},
    session_cache::ModelStore,
    telemetry::{JsonLinesSink, NoOpSink, PredictionRecord, PredictionSink},
    tracing_config::{events, spans},
    types::{InputTensor, Prediction, ProcessingTimings},
    utils::{ImageCrateDecoder, ImageDecoder, ImagePreprocessor, TensorValidator},
};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::Instrument;

/// Source name used when the caller supplies no identifier
pub const UNNAMED_SOURCE: &str = "<bytes>";

/// Prediction together with the stage timings that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub source: String,
    pub prediction: Prediction,
    pub timings: ProcessingTimings,
}

/// Image classification pipeline
///
/// Cheap to clone; clones share the model store, so artifacts are loaded once
/// no matter how many clones analyze images concurrently.
#[derive(Clone)]
pub struct ImageClassifier {
    store: Arc<ModelStore>,
    decoder: Arc<dyn ImageDecoder>,
    presenter: Arc<dyn PredictionPresenter>,
    sink: Arc<dyn PredictionSink>,
}

impl std::fmt::Debug for ImageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClassifier")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ImageClassifier {
    /// Create a classifier with the backends compiled into this build
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to set up the artifact downloader
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(DefaultBackendFactory))
    }

    /// Create a classifier with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Failed to set up the artifact downloader
    pub fn with_factory(config: ClassifierConfig, factory: Arc<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;

        let decoder: Arc<dyn ImageDecoder> =
            Arc::new(ImageCrateDecoder::new(config.resample_filter));
        let sink: Arc<dyn PredictionSink> = match &config.prediction_log {
            Some(path) => Arc::new(JsonLinesSink::new(path.clone())),
            None => Arc::new(NoOpSink),
        };

        Ok(Self {
            store: Arc::new(ModelStore::new(config, factory)?),
            decoder,
            presenter: Arc::new(TriagePresenter),
            sink,
        })
    }

    /// Replace the image decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the presentation text producer
    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn PredictionPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Replace the prediction telemetry sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn PredictionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Shared model store
    #[must_use]
    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        self.store.config()
    }

    /// Load both artifacts ahead of the first request
    ///
    /// # Errors
    /// - Model or label artifact failed to load
    pub async fn warm_up(&self) -> Result<ModelInfo> {
        let loaded = self.store.loaded_model().await?;
        let labels = self.store.get_class_names().await?;
        tracing::info!(
            model = %loaded.info.name,
            backend = %loaded.info.backend,
            classes = labels.len(),
            "classifier warmed up"
        );
        Ok(loaded.info.clone())
    }

    /// Classify encoded image bytes
    ///
    /// # Errors
    /// - `Preprocessing` for empty, undecodable or non-RGB input
    /// - `Load` when an artifact cannot be loaded
    /// - `ModelOutput` when the model output does not match the label map
    /// - `Inference` or `Internal` for engine and runtime failures
    pub async fn analyze(&self, bytes: &[u8]) -> Result<Prediction> {
        self.analyze_named(UNNAMED_SOURCE, bytes).await
    }

    /// Classify encoded image bytes, tagging logs and telemetry with `source`
    ///
    /// # Errors
    /// - See [`ImageClassifier::analyze`]
    pub async fn analyze_named(&self, source: &str, bytes: &[u8]) -> Result<Prediction> {
        Ok(self.analyze_detailed(source, bytes).await?.prediction)
    }

    /// Read and classify an image file
    ///
    /// # Errors
    /// - File could not be read (`Io`)
    /// - See [`ImageClassifier::analyze`]
    pub async fn analyze_file<P: AsRef<Path>>(&self, path: P) -> Result<Prediction> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::file_io_error("read image", path, &e))?;
        self.analyze_named(&path.display().to_string(), &bytes).await
    }

    /// Drain an async reader and classify its contents
    ///
    /// # Errors
    /// - Reading the stream failed (`Io`)
    /// - See [`ImageClassifier::analyze`]
    pub async fn analyze_reader<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<Prediction> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        self.analyze(&buffer).await
    }

    /// Classify and report per-stage timings
    ///
    /// # Errors
    /// - See [`ImageClassifier::analyze`]
    pub async fn analyze_detailed(&self, source: &str, bytes: &[u8]) -> Result<Analysis> {
        let span = spans::analysis(source, bytes.len());
        self.run_pipeline(source, bytes).instrument(span).await
    }

    async fn run_pipeline(&self, source: &str, bytes: &[u8]) -> Result<Analysis> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        // Bad input is rejected before any artifact is touched
        let stage_start = Instant::now();
        let tensor = self.preprocess(bytes).await?;
        timings.preprocessing_ms = stage_start.elapsed().as_millis() as u64;
        events::performance_metric("preprocessing", timings.preprocessing_ms);

        let stage_start = Instant::now();
        let backend = self.store.get_session().await?;
        let labels = self.store.get_class_names().await?;
        timings.model_ready_ms = stage_start.elapsed().as_millis() as u64;

        TensorValidator::validate_input_shape(&tensor, backend.input_shape())?;

        let stage_start = Instant::now();
        let outputs = Self::infer(Arc::clone(&backend), tensor)
            .instrument(spans::inference(backend.name()))
            .await?;
        timings.inference_ms = stage_start.elapsed().as_millis() as u64;
        events::performance_metric("inference", timings.inference_ms);

        let stage_start = Instant::now();
        let prediction = {
            let _span = spans::postprocessing(labels.len()).entered();
            self.decode(outputs, &labels)?
        };
        timings.postprocessing_ms = stage_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        events::prediction(
            source,
            prediction.label(),
            prediction.confidence(),
            timings.total_ms,
        );
        self.notify_sink(source, &prediction).await;

        Ok(Analysis {
            source: source.to_string(),
            prediction,
            timings,
        })
    }

    async fn preprocess(&self, bytes: &[u8]) -> Result<InputTensor> {
        let decoder = Arc::clone(&self.decoder);
        let bytes = bytes.to_vec();
        let span = spans::preprocessing(bytes.len());

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            ImagePreprocessor::preprocess(decoder.as_ref(), &bytes)
        })
        .await
        .map_err(|e| ClassifierError::internal(format!("Preprocessing task failed: {}", e)))?
    }

    async fn infer(backend: Arc<dyn InferenceBackend>, tensor: InputTensor) -> Result<ModelOutputs> {
        tokio::task::spawn_blocking(move || backend.run(&tensor))
            .await
            .map_err(|e| ClassifierError::internal(format!("Inference task failed: {}", e)))?
    }

    fn decode(&self, mut outputs: ModelOutputs, labels: &ClassLabelMap) -> Result<Prediction> {
        let output_name = &self.config().logits_output;
        let Some(logits) = outputs.remove(output_name) else {
            let mut available: Vec<String> = outputs.into_keys().collect();
            available.sort();
            return Err(ClassifierError::model_output(format!(
                "Model has no '{}' output (available: [{}])",
                output_name,
                available.join(", ")
            )));
        };

        TensorValidator::validate_logits(&logits, labels)?;
        ClassificationDecoder::new(self.presenter.as_ref()).decode(&logits, labels)
    }

    async fn notify_sink(&self, source: &str, prediction: &Prediction) {
        let record = PredictionRecord::from_prediction(source, prediction);
        if let Err(e) = self.sink.record(&record).await {
            tracing::warn!(source = %source, error = %e, "prediction telemetry failed");
        }
    }
}
