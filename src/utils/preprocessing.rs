//! Image decoding, cover-fit resizing and tensor normalization
//!
//! Decoding is a capability ([`ImageDecoder`]) so hosts can plug in another
//! decoder; normalization is a pure function of the pixel grid.

use crate::{
    config::ResampleFilter,
    error::{ClassifierError, Result},
    types::{InputTensor, PixelGrid, INPUT_SHAPE, INPUT_SIZE},
};
use image::DynamicImage;
use ndarray::Array4;

/// Per-channel mean (R, G, B) the model was trained with
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation (R, G, B) the model was trained with
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns encoded image bytes into a 256x256 RGB grid
pub trait ImageDecoder: Send + Sync {
    /// Decode, cover-fit to 256x256 and drop alpha
    ///
    /// # Errors
    /// - Bytes are empty or not a supported image format
    /// - Decoded image has fewer than 3 color channels
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid>;
}

/// [`ImageDecoder`] backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder {
    filter: ResampleFilter,
}

impl ImageCrateDecoder {
    #[must_use]
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }

    /// Cover-fit an already decoded image
    ///
    /// Crops the centred square of the source, then resamples it to 256x256.
    /// No padding is ever introduced, and the intermediate buffer never
    /// exceeds the source size.
    ///
    /// # Errors
    /// - Image has fewer than 3 color channels
    /// - Image has a zero dimension
    pub fn fit(&self, image: &DynamicImage) -> Result<PixelGrid> {
        let channels = image.color().channel_count();
        if channels < 3 {
            return Err(ClassifierError::preprocessing(format!(
                "Image has {} color channel(s); RGB input is required",
                channels
            )));
        }

        let (x, y, side) = cover_crop(image.width(), image.height()).ok_or_else(|| {
            ClassifierError::preprocessing(format!(
                "Image has no pixels ({}x{})",
                image.width(),
                image.height()
            ))
        })?;

        let resized = image.crop_imm(x, y, side, side).resize_exact(
            INPUT_SIZE,
            INPUT_SIZE,
            self.filter.to_filter_type(),
        );
        PixelGrid::from_rgb_image(resized.to_rgb8())
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid> {
        if bytes.is_empty() {
            return Err(ClassifierError::preprocessing("Image data is empty"));
        }

        let image = image::load_from_memory(bytes).map_err(|e| {
            ClassifierError::preprocessing(format!("Failed to decode image: {}", e))
        })?;

        log::debug!(
            "Decoded {}x{} image ({:?})",
            image.width(),
            image.height(),
            image.color()
        );

        self.fit(&image)
    }
}

/// Centred square crop `(x, y, side)` for a `width x height` source
fn cover_crop(width: u32, height: u32) -> Option<(u32, u32, u32)> {
    let side = width.min(height);
    if side == 0 {
        return None;
    }
    Some(((width - side) / 2, (height - side) / 2, side))
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Normalize a pixel grid into a channel-first tensor
    ///
    /// Each value is `(pixel / 255 - mean[c]) / std[c]`, stored at
    /// `c * 65536 + row * 256 + col`. No clamping.
    #[must_use]
    pub fn normalize(grid: &PixelGrid) -> InputTensor {
        let mut tensor = Array4::<f32>::zeros(INPUT_SHAPE);

        #[allow(clippy::indexing_slicing)]
        // Safe: grid is always INPUT_SIZE square and the tensor matches it
        for (y, row) in grid.as_image().rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] =
                        (f32::from(pixel[c]) / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
            }
        }

        InputTensor::from_normalized(tensor)
    }

    /// Decode and normalize in one step
    ///
    /// # Errors
    /// - Any failure reported by the decoder
    pub fn preprocess(decoder: &dyn ImageDecoder, bytes: &[u8]) -> Result<InputTensor> {
        let grid = decoder.decode(bytes)?;
        Ok(Self::normalize(&grid))
    }
}
