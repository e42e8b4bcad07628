//! Shared utilities: preprocessing, provider parsing and validation

pub mod preprocessing;
pub mod providers;
pub mod validation;

pub use preprocessing::{ImageCrateDecoder, ImageDecoder, ImagePreprocessor};
pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use validation::{NumericValidator, TensorValidator};
