//! ONNX Runtime backend for classification models
//!
//! Builds an `ort` session from serialized graph bytes and exposes it through
//! [`InferenceBackend`]. Execution providers (CPU, CUDA, `CoreML`) are chosen
//! from the configuration with availability checks and a CPU fallback.

use crate::config::{ClassifierConfig, ExecutionProvider};
use crate::error::{ClassifierError, Result};
use crate::inference::{resolve_input_name, InferenceBackend, ModelOutputs};
use crate::types::InputTensor;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use std::sync::Mutex;

use instant::Instant;

/// ONNX Runtime backend
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex
/// and concurrent requests on one backend are serialized.
#[derive(Debug)]
pub struct OnnxBackend {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// # Examples
    /// ```rust
    /// use mri_classify::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, available, description);
    /// }
    /// ```
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a session from serialized ONNX bytes
    ///
    /// # Errors
    /// - Bytes are not a valid ONNX graph
    /// - Session builder configuration failures
    /// - Configured input name not declared by the graph
    pub fn from_bytes(model_data: &[u8], config: &ClassifierConfig) -> Result<Self> {
        let load_start = Instant::now();

        let builder = Session::builder()
            .map_err(|e| ClassifierError::load(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::load(format!("Failed to set optimization level: {e}")))?;

        let builder = Self::with_providers(builder, config.execution_provider)?;

        let (intra_threads, inter_threads) = resolve_threads(config);
        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| ClassifierError::load(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| ClassifierError::load(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(model_data)
            .map_err(|e| ClassifierError::load(format!("Failed to parse ONNX model: {e}")))?;

        let declared_inputs: Vec<String> =
            session.inputs.iter().map(|input| input.name.clone()).collect();
        let input_name = resolve_input_name(&declared_inputs, config.input_name.as_deref())?;
        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        log::debug!(
            "ONNX session ready: input '{}', outputs {:?}, {} intra / {} inter threads",
            input_name,
            output_names,
            intra_threads,
            inter_threads
        );
        log::info!(
            "ONNX Runtime session created in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
        })
    }

    fn with_providers(
        builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_available =
            || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false)
        };

        let mut providers = Vec::new();
        match provider {
            ExecutionProvider::Auto => {
                if cuda_available() {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    log::info!("Using CUDA execution provider");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("Using CoreML execution provider");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }

        if providers.is_empty() {
            return Ok(builder);
        }

        builder.with_execution_providers(providers).map_err(|e| {
            ClassifierError::load(format!("Failed to set {} execution provider: {e}", provider))
        })
    }
}

fn resolve_threads(config: &ClassifierConfig) -> (usize, usize) {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8);
    let intra = if config.intra_threads > 0 {
        config.intra_threads
    } else {
        cores
    };
    let inter = if config.inter_threads > 0 {
        config.inter_threads
    } else {
        (cores / 4).max(1)
    };
    (intra, inter)
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_names(&self) -> Vec<String> {
        self.output_names.clone()
    }

    fn run(&self, input: &InputTensor) -> Result<ModelOutputs> {
        let inference_start = Instant::now();

        let input_value = Value::from_array(input.as_array().clone()).map_err(|e| {
            ClassifierError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::internal("ONNX session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| ClassifierError::inference(format!("ONNX inference failed: {e}")))?;

        let mut collected = ModelOutputs::new();
        for name in outputs.keys() {
            let Some(value) = outputs.get(name) else {
                continue;
            };
            match value.try_extract_array::<f32>() {
                Ok(array) => {
                    collected.insert(name.to_string(), array.iter().copied().collect());
                },
                Err(e) => {
                    log::debug!("Skipping non-f32 output '{}': {}", name, e);
                },
            }
        }

        log::debug!(
            "ONNX inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(collected)
    }
}
