//! Tract backend for classification models
//!
//! Pure Rust inference with no native dependencies. The graph's input fact is
//! pinned to `[1, 3, 256, 256]` before optimization so Tract can fold shapes.

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, Result};
use crate::inference::{resolve_input_name, InferenceBackend, ModelOutputs};
use crate::types::{InputTensor, INPUT_SHAPE};
use tract_onnx::prelude::*;

use instant::Instant;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend running an optimized, shape-pinned plan
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
    input_name: String,
    output_names: Vec<String>,
}

impl TractBackend {
    /// Tract runs on the CPU only
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Parse, pin and optimize a graph from serialized ONNX bytes
    ///
    /// # Errors
    /// - Bytes are not a valid ONNX graph
    /// - Configured input name not declared by the graph
    /// - Optimization fails for the pinned input shape
    pub fn from_bytes(model_data: &[u8], config: &ClassifierConfig) -> Result<Self> {
        let load_start = Instant::now();

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| ClassifierError::load(format!("Failed to parse ONNX model: {e}")))?;

        let declared_inputs = outlet_names(&model, model.input_outlets())?;
        let input_name = resolve_input_name(&declared_inputs, config.input_name.as_deref())?;
        let input_index = declared_inputs
            .iter()
            .position(|name| *name == input_name)
            .unwrap_or(0);
        let output_names = outlet_names(&model, model.output_outlets())?;

        let (batch, channels, height, width) = INPUT_SHAPE;
        let model = model
            .with_input_fact(input_index, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| ClassifierError::load(format!("Failed to pin input shape: {e}")))?
            .into_optimized()
            .map_err(|e| ClassifierError::load(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                ClassifierError::load(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "Tract backend initialized in {}ms (input '{}', outputs {:?})",
            load_start.elapsed().as_millis(),
            input_name,
            output_names
        );

        Ok(Self {
            model,
            input_name,
            output_names,
        })
    }
}

fn outlet_names(
    model: &InferenceModel,
    outlets: TractResult<&[OutletId]>,
) -> Result<Vec<String>> {
    let outlets =
        outlets.map_err(|e| ClassifierError::load(format!("Failed to read graph outlets: {e}")))?;
    Ok(outlets
        .iter()
        .map(|outlet| {
            model
                .outlet_label(*outlet)
                .map_or_else(|| model.node(outlet.node).name.clone(), ToString::to_string)
        })
        .collect())
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_names(&self) -> Vec<String> {
        self.output_names.clone()
    }

    fn run(&self, input: &InputTensor) -> Result<ModelOutputs> {
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.as_array().clone());
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| ClassifierError::inference(format!("Tract inference failed: {e}")))?;

        let mut collected = ModelOutputs::new();
        for (name, value) in self.output_names.iter().zip(outputs.iter()) {
            match value.to_array_view::<f32>() {
                Ok(view) => {
                    collected.insert(name.clone(), view.iter().copied().collect());
                },
                Err(e) => log::debug!("Skipping non-f32 output '{}': {}", name, e),
            }
        }

        log::debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(collected)
    }
}
