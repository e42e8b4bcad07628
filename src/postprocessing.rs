//! Logits to prediction: softmax, argmax and presentation
//!
//! The numeric part ([`softmax`], [`argmax`]) is fixed. The human-facing text
//! comes from a [`PredictionPresenter`], so hosts can swap the wording without
//! touching the classification result.

use crate::error::{ClassifierError, Result};
use crate::labels::ClassLabelMap;
use crate::types::{Prediction, Presentation};
use crate::utils::NumericValidator;
use std::collections::BTreeMap;

/// Overlay shown for tumor-like predictions
pub const TUMOR_OVERLAY_URL: &str = "/cases/case-glioma.svg";
/// Overlay shown for clear predictions
pub const CLEAR_OVERLAY_URL: &str = "/cases/case-healthy.svg";

/// Allowed deviation of the probability sum from 1
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Numerically stable softmax
///
/// Subtracts the maximum before exponentiating. Computed in `f64`.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .map(f64::from)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|&v| (f64::from(v) - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; ties go to the first occurrence
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {},
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Produces the human-facing text for a classified label
pub trait PredictionPresenter: Send + Sync {
    fn present(&self, label: &str, confidence: f64) -> Presentation;
}

/// Two fixed templates: tumor-like versus clear
#[derive(Debug, Clone, Copy, Default)]
pub struct TriagePresenter;

impl TriagePresenter {
    /// Label mentions "tumor" or "cancer", case-insensitively
    #[must_use]
    pub fn is_tumor_like(label: &str) -> bool {
        let lower = label.to_lowercase();
        lower.contains("tumor") || lower.contains("cancer")
    }
}

impl PredictionPresenter for TriagePresenter {
    fn present(&self, label: &str, _confidence: f64) -> Presentation {
        if Self::is_tumor_like(label) {
            Presentation {
                summary: "AI suggests tumor presence in this slice; please review overlay and full study."
                    .to_string(),
                recommendations: vec![
                    "Review overlay with radiologist.".to_string(),
                    "Consider prioritizing for neuro consult or follow-up sequencing.".to_string(),
                ],
                overlay_url: Some(TUMOR_OVERLAY_URL.to_string()),
            }
        } else {
            Presentation {
                summary: "No focal lesion detected in this slice; radiologist sign-off required."
                    .to_string(),
                recommendations: vec![
                    "Radiologist review recommended before clearing the study.".to_string(),
                ],
                overlay_url: Some(CLEAR_OVERLAY_URL.to_string()),
            }
        }
    }
}

/// Turns a logits vector into a [`Prediction`]
pub struct ClassificationDecoder<'a> {
    presenter: &'a dyn PredictionPresenter,
}

impl<'a> ClassificationDecoder<'a> {
    #[must_use]
    pub fn new(presenter: &'a dyn PredictionPresenter) -> Self {
        Self { presenter }
    }

    /// Softmax, pick the first maximum and attach presentation text
    ///
    /// Indices beyond the label map get the synthetic `class_<i>` label.
    ///
    /// # Errors
    /// - Empty logits
    /// - Non-finite logits, which leave no valid distribution (`Internal`)
    pub fn decode(&self, logits: &[f32], labels: &ClassLabelMap) -> Result<Prediction> {
        let probabilities = softmax(logits);
        let class_index = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::model_output("Cannot decode an empty logit vector"))?;
        NumericValidator::validate_distribution(&probabilities, PROBABILITY_TOLERANCE)?;

        let confidence = probabilities.get(class_index).copied().unwrap_or(0.0);
        let label = labels.label_or_synthetic(class_index);

        let by_label: BTreeMap<String, f64> = probabilities
            .iter()
            .enumerate()
            .map(|(index, &p)| (labels.label_or_synthetic(index), p))
            .collect();

        let presentation = self.presenter.present(&label, confidence);
        Ok(Prediction::new(
            label,
            class_index,
            confidence,
            by_label,
            presentation,
        ))
    }
}
