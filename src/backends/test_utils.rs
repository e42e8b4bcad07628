//! Test utilities and mock backends for testing inference functionality
//!
//! Mocks implement [`InferenceBackend`] and [`BackendFactory`] so the pipeline
//! can be exercised without model files or a native runtime.

use crate::{
    config::{BackendType, ClassifierConfig},
    error::{ClassifierError, Result},
    inference::{BackendFactory, InferenceBackend, ModelOutputs},
    types::InputTensor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock backend returning fixed logits under a configurable output name
#[derive(Debug, Clone)]
pub struct MockBackend {
    logits: Vec<f32>,
    output_name: String,
    should_fail_inference: bool,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    #[must_use]
    pub fn new(logits: Vec<f32>) -> Self {
        Self {
            logits,
            output_name: "logits".to_string(),
            should_fail_inference: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Emit the logits under a different output name
    #[must_use]
    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_name = name.to_string();
        self
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new(vec![0.0]);
        backend.should_fail_inference = true;
        backend
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn input_name(&self) -> &str {
        "input"
    }

    fn output_names(&self) -> Vec<String> {
        vec![self.output_name.clone()]
    }

    fn run(&self, input: &InputTensor) -> Result<ModelOutputs> {
        self.record_call("run");
        if self.should_fail_inference {
            return Err(ClassifierError::inference("Mock inference failure"));
        }
        if input.shape() != self.input_shape() {
            return Err(ClassifierError::inference("Mock received wrong input shape"));
        }

        let mut outputs = ModelOutputs::new();
        outputs.insert(self.output_name.clone(), self.logits.clone());
        Ok(outputs)
    }
}

/// Test factory for creating mock backends
///
/// Counts `create_backend` calls, can fail the first N of them, and can sleep
/// during creation to widen race windows in concurrency tests.
#[derive(Debug, Clone)]
pub struct MockBackendFactory {
    template: MockBackend,
    creations: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
    creation_delay: Option<Duration>,
}

impl MockBackendFactory {
    /// Factory whose backends all return `logits`
    #[must_use]
    pub fn with_logits(logits: Vec<f32>) -> Self {
        Self::from_backend(MockBackend::new(logits))
    }

    #[must_use]
    pub fn from_backend(template: MockBackend) -> Self {
        Self {
            template,
            creations: Arc::new(AtomicUsize::new(0)),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            creation_delay: None,
        }
    }

    /// Fail the next `count` creation attempts with a load error
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every creation attempt
    #[must_use]
    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    /// Number of creation attempts so far, including failed ones
    #[must_use]
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _model_data: &[u8],
        _config: &ClassifierConfig,
    ) -> Result<Box<dyn InferenceBackend>> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.creation_delay {
            std::thread::sleep(delay);
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ClassifierError::load(
                "Mock factory configured to fail backend creation",
            ));
        }

        Ok(Box::new(self.template.clone()))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx, BackendType::Tract]
    }
}

/// Encode a solid-color PNG of the given size
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn zeros() -> InputTensor {
        InputTensor::from_array(Array4::zeros((1, 3, 256, 256))).unwrap()
    }

    #[test]
    fn test_mock_backend_records_calls() {
        let backend = MockBackend::new(vec![1.0, 2.0]);
        let outputs = backend.run(&zeros()).unwrap();
        assert_eq!(outputs["logits"], vec![1.0, 2.0]);
        assert_eq!(backend.get_call_history(), vec!["run".to_string()]);
    }

    #[test]
    fn test_mock_backend_output_name_override() {
        let backend = MockBackend::new(vec![1.0]).with_output_name("scores");
        let outputs = backend.run(&zeros()).unwrap();
        assert!(outputs.contains_key("scores"));
        assert!(!outputs.contains_key("logits"));
    }

    #[test]
    fn test_mock_backend_failing_inference() {
        let backend = MockBackend::new_failing_inference();
        assert!(matches!(
            backend.run(&zeros()),
            Err(ClassifierError::Inference(_))
        ));
    }

    #[test]
    fn test_factory_fails_first_n() {
        let factory = MockBackendFactory::with_logits(vec![0.0]).failing_first(2);
        let config = ClassifierConfig::default();

        assert!(factory.create_backend(BackendType::Onnx, b"", &config).is_err());
        assert!(factory.create_backend(BackendType::Onnx, b"", &config).is_err());
        assert!(factory.create_backend(BackendType::Onnx, b"", &config).is_ok());
        assert_eq!(factory.creations(), 3);
    }

    #[test]
    fn test_solid_png_decodes() {
        let bytes = solid_png(4, 2, [10, 20, 30]);
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }
}
