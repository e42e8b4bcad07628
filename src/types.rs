//! Core data types flowing through the classification pipeline

use crate::error::{ClassifierError, Result};
use image::RgbImage;
use ndarray::{Array4, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 256;

/// Number of color channels fed to the model (R, G, B)
pub const INPUT_CHANNELS: usize = 3;

/// Number of values in one channel plane (256 * 256)
pub const PLANE_LEN: usize = (INPUT_SIZE as usize) * (INPUT_SIZE as usize);

/// Number of values in the whole input tensor (3 * 256 * 256)
pub const TENSOR_LEN: usize = INPUT_CHANNELS * PLANE_LEN;

/// Declared model input shape `[batch, channels, height, width]`
pub const INPUT_SHAPE: (usize, usize, usize, usize) =
    (1, INPUT_CHANNELS, INPUT_SIZE as usize, INPUT_SIZE as usize);

/// A 256x256 grid of RGB pixels produced by the decoder/resizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    pixels: RgbImage,
}

impl PixelGrid {
    /// Wrap an RGB image that is already exactly `INPUT_SIZE` square
    ///
    /// # Errors
    /// - Image dimensions differ from `INPUT_SIZE x INPUT_SIZE`
    pub fn from_rgb_image(pixels: RgbImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width != INPUT_SIZE || height != INPUT_SIZE {
            return Err(ClassifierError::preprocessing(format!(
                "Pixel grid must be {}x{}, got {}x{}",
                INPUT_SIZE, INPUT_SIZE, width, height
            )));
        }
        Ok(Self { pixels })
    }

    /// Build a grid where every position holds the same color
    #[must_use]
    pub fn filled(rgb: [u8; 3]) -> Self {
        Self {
            pixels: RgbImage::from_pixel(INPUT_SIZE, INPUT_SIZE, image::Rgb(rgb)),
        }
    }

    /// RGB triple at `(row, col)`, `None` outside the grid
    #[must_use]
    pub fn pixel(&self, row: u32, col: u32) -> Option<[u8; 3]> {
        self.pixels.get_pixel_checked(col, row).map(|p| p.0)
    }

    /// Number of RGB triples in the grid
    #[must_use]
    pub fn len(&self) -> usize {
        (self.pixels.width() as usize) * (self.pixels.height() as usize)
    }

    /// Always false; a grid is never empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying image buffer
    #[must_use]
    pub fn as_image(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Channel-first float tensor of shape `[1, 3, 256, 256]`
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// Wrap an array, checking the declared input shape
    ///
    /// Arrays in any memory order are accepted and copied into standard
    /// (row-major) layout when needed.
    ///
    /// # Errors
    /// - Array shape differs from `INPUT_SHAPE`
    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        if data.dim() != INPUT_SHAPE {
            return Err(ClassifierError::internal(format!(
                "Input tensor shape mismatch. Expected {:?}, got {:?}",
                INPUT_SHAPE,
                data.dim()
            )));
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { data })
    }

    pub(crate) fn from_normalized(data: Array4<f32>) -> Self {
        debug_assert_eq!(data.dim(), INPUT_SHAPE);
        Self { data }
    }

    /// Flat view in `channel*65536 + row*256 + col` order
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        // Constructors keep `data` in standard layout
        self.data.as_slice().unwrap_or(&[])
    }

    /// Number of values (always `TENSOR_LEN`)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape of the tensor
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    /// One channel plane as a `[height, width]` view, `None` past the last channel
    #[must_use]
    pub fn channel(&self, channel: usize) -> Option<ArrayView2<'_, f32>> {
        (channel < self.data.dim().1).then(|| self.data.slice(ndarray::s![0, channel, .., ..]))
    }

    /// Borrow the underlying array
    #[must_use]
    pub fn as_array(&self) -> &Array4<f32> {
        &self.data
    }

    /// Take ownership of the underlying array
    #[must_use]
    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Classification result returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    label: String,
    class_index: usize,
    confidence: f64,
    probabilities: BTreeMap<String, f64>,
    summary: String,
    recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlay_url: Option<String>,
}

impl Prediction {
    pub(crate) fn new(
        label: String,
        class_index: usize,
        confidence: f64,
        probabilities: BTreeMap<String, f64>,
        presentation: Presentation,
    ) -> Self {
        Self {
            label,
            class_index,
            confidence,
            probabilities,
            summary: presentation.summary,
            recommendations: presentation.recommendations,
            overlay_url: presentation.overlay_url,
        }
    }

    /// Predicted class name
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Index of the predicted class in the model output
    #[must_use]
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Probability of the predicted class, in `[0, 1]`
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Probability per class name
    #[must_use]
    pub fn probabilities(&self) -> &BTreeMap<String, f64> {
        &self.probabilities
    }

    /// Human-facing one-line summary
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Ordered follow-up recommendations
    #[must_use]
    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    /// Reference to an illustrative overlay, if any
    #[must_use]
    pub fn overlay_url(&self) -> Option<&str> {
        self.overlay_url.as_deref()
    }
}

/// Human-facing text attached to a numeric result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presentation {
    pub summary: String,
    pub recommendations: Vec<String>,
    pub overlay_url: Option<String>,
}

/// Per-stage timing information for one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Waiting for the model store
    pub model_ready_ms: u64,
    /// Decode, resize and normalize
    pub preprocessing_ms: u64,
    /// Backend execution
    pub inference_ms: u64,
    /// Softmax and decoding
    pub postprocessing_ms: u64,
    /// End to end
    pub total_ms: u64,
}
