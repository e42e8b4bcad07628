//! Inference backend abstraction and factory

use crate::{
    config::{BackendType, ClassifierConfig},
    error::{ClassifierError, Result},
    types::{InputTensor, INPUT_SHAPE},
};
use std::collections::HashMap;

/// Named output tensors of one model run, flattened in row-major order
pub type ModelOutputs = HashMap<String, Vec<f32>>;

/// A loaded model able to run forward passes
///
/// Implementations are shared between concurrent requests through an `Arc`,
/// so `run` takes `&self` and any interior state must be synchronized.
pub trait InferenceBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name (`onnx`, `tract`, ...)
    fn name(&self) -> &'static str;

    /// Graph input the tensor is bound to
    fn input_name(&self) -> &str;

    /// Declared graph output names
    fn output_names(&self) -> Vec<String>;

    /// Expected input shape
    fn input_shape(&self) -> (usize, usize, usize, usize) {
        INPUT_SHAPE
    }

    /// Run one forward pass
    ///
    /// # Errors
    /// - Backend execution failures
    /// - Output tensors that are not `f32`
    fn run(&self, input: &InputTensor) -> Result<ModelOutputs>;
}

/// Factory trait for creating inference backends from model bytes
pub trait BackendFactory: Send + Sync {
    /// Build a backend of the requested type from a serialized graph
    ///
    /// # Errors
    /// - Unsupported backend types
    /// - Graph parsing or session creation failures
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_data: &[u8],
        config: &ClassifierConfig,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Factory wiring the backends compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[allow(unused_variables)]
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_data: &[u8],
        config: &ClassifierConfig,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::from_bytes(
                model_data, config,
            )?)),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::from_bytes(
                model_data, config,
            )?)),
            #[allow(unreachable_patterns)]
            other => Err(ClassifierError::invalid_config(format!(
                "{} backend not compiled into this build",
                other
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Pick the input name: an explicit override, else the first declared input
///
/// # Errors
/// - Graph declares no inputs
/// - Override names an input the graph does not declare
pub(crate) fn resolve_input_name(
    declared: &[String],
    override_name: Option<&str>,
) -> Result<String> {
    match override_name {
        Some(name) if declared.iter().any(|d| d == name) => Ok(name.to_string()),
        Some(name) => Err(ClassifierError::load(format!(
            "Model has no input named '{}' (inputs: {})",
            name,
            declared.join(", ")
        ))),
        None => declared
            .first()
            .cloned()
            .ok_or_else(|| ClassifierError::load("Model declares no inputs")),
    }
}
