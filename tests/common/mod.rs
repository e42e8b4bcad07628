//! Shared fixtures for integration tests
//!
//! In-memory stand-ins for the inference capability so the public pipeline can
//! be exercised without a model file or a native runtime.

#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use mri_classify::{
    BackendFactory, BackendType, ClassifierConfig, ClassifierError, ImageClassifier,
    InferenceBackend, InputTensor, LoadFailurePolicy, ModelOutputs, ModelSpec, Result,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TWO_CLASS_LABELS: &str = r#"{"classes": ["no_tumor", "glioma_tumor"]}"#;
pub const FOUR_CLASS_LABELS: &str = r#"{
    "classes": ["glioma_tumor", "meningioma_tumor", "no_tumor", "pituitary_tumor"],
    "class_to_idx": {"glioma_tumor": 0, "meningioma_tumor": 1, "no_tumor": 2, "pituitary_tumor": 3}
}"#;

/// Backend whose logits are derived from the mean of each input channel
///
/// Different images produce different, deterministic logits, which is what
/// the determinism and layout properties need.
#[derive(Debug)]
pub struct ChannelMeanBackend {
    num_classes: usize,
    output_name: String,
    runs: Arc<AtomicUsize>,
}

impl InferenceBackend for ChannelMeanBackend {
    fn name(&self) -> &'static str {
        "channel-mean"
    }

    fn input_name(&self) -> &str {
        "input"
    }

    fn output_names(&self) -> Vec<String> {
        vec![self.output_name.clone()]
    }

    fn run(&self, input: &InputTensor) -> Result<ModelOutputs> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let means: Vec<f32> = (0..3)
            .map(|c| {
                input
                    .channel(c)
                    .and_then(|plane| plane.mean())
                    .unwrap_or(0.0)
            })
            .collect();
        let logits = (0..self.num_classes)
            .map(|i| means[i % 3] * (i as f32 + 1.0))
            .collect();

        let mut outputs = ModelOutputs::new();
        outputs.insert(self.output_name.clone(), logits);
        Ok(outputs)
    }
}

/// Factory counting how many backends it built
#[derive(Debug, Clone)]
pub struct CountingFactory {
    pub num_classes: usize,
    pub output_name: String,
    pub delay: Duration,
    pub fail_first: usize,
    pub creations: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            output_name: "logits".to_string(),
            delay: Duration::ZERO,
            fail_first: 0,
            creations: Arc::new(AtomicUsize::new(0)),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_output_name(mut self, name: &str) -> Self {
        self.output_name = name.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl BackendFactory for CountingFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        model_data: &[u8],
        _config: &ClassifierConfig,
    ) -> Result<Box<dyn InferenceBackend>> {
        let attempt = self.creations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if attempt < self.fail_first {
            return Err(ClassifierError::inference("graph failed to compile"));
        }
        if model_data.is_empty() {
            return Err(ClassifierError::inference("empty graph"));
        }

        Ok(Box::new(ChannelMeanBackend {
            num_classes: self.num_classes,
            output_name: self.output_name.clone(),
            runs: Arc::clone(&self.runs),
        }))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Onnx]
    }
}

pub fn memory_config(labels: &str, policy: LoadFailurePolicy) -> ClassifierConfig {
    ClassifierConfig::builder()
        .model_spec(ModelSpec::from_memory(
            b"onnx-graph".to_vec(),
            labels.as_bytes().to_vec(),
        ))
        .load_failure_policy(policy)
        .build()
        .expect("valid config")
}

pub fn classifier(labels: &str, factory: &CountingFactory) -> ImageClassifier {
    ImageClassifier::with_factory(
        memory_config(labels, LoadFailurePolicy::Retry),
        Arc::new(factory.clone()),
    )
    .expect("classifier")
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("encode test image");
    bytes
}

pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3], format: ImageFormat) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb))),
        format,
    )
}

pub fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba))),
        ImageFormat::Png,
    )
}

/// A left-to-right gradient, so crops and resamples are observable
pub fn gradient(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Png)
}
