//! Tensor validation utilities
//!
//! Checks the input tensor against the backend's declared shape and the
//! logits vector against the loaded label map.

use crate::error::{ClassifierError, Result};
use crate::labels::ClassLabelMap;
use crate::types::InputTensor;

/// Validator for tensor operations and shape validation
pub struct TensorValidator;

impl TensorValidator {
    /// Validate the input tensor matches the shape the backend expects
    ///
    /// # Errors
    /// - Shape mismatch (model output error: the artifact expects another layout)
    pub fn validate_input_shape(
        tensor: &InputTensor,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.shape();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(ClassifierError::model_output(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate a logits vector against the label map before decoding
    ///
    /// # Errors
    /// - Empty logits
    /// - Logit count differs from the number of labels
    /// - Non-finite values
    pub fn validate_logits(logits: &[f32], labels: &ClassLabelMap) -> Result<()> {
        if logits.is_empty() {
            return Err(ClassifierError::model_output("Model returned no logits"));
        }

        if logits.len() != labels.len() {
            return Err(ClassifierError::model_output(format!(
                "Model returned {} logits but the label map has {} classes",
                logits.len(),
                labels.len()
            )));
        }

        if let Some(index) = logits.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::model_output(format!(
                "Logit {} is not finite ({})",
                index,
                logits.get(index).copied().unwrap_or(f32::NAN)
            )));
        }

        Ok(())
    }
}
