//! Centralized validation helpers

pub mod numeric;
pub mod tensor;

pub use numeric::NumericValidator;
pub use tensor::TensorValidator;
