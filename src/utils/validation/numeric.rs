//! Numeric validation utilities

use crate::error::{ClassifierError, Result};

/// Validator for numeric settings and distributions
pub struct NumericValidator;

impl NumericValidator {
    /// Validate thread count
    ///
    /// # Errors
    /// - Count above the supported maximum
    pub fn validate_thread_count(value: usize) -> Result<usize> {
        const MAX_THREADS: usize = 256;

        if value > MAX_THREADS {
            return Err(ClassifierError::invalid_config(format!(
                "Thread count {} exceeds maximum allowed ({})",
                value, MAX_THREADS
            )));
        }
        Ok(value)
    }

    /// Validate a concurrency limit for batch processing
    ///
    /// # Errors
    /// - Zero
    pub fn validate_concurrency(value: usize) -> Result<usize> {
        if value == 0 {
            return Err(ClassifierError::invalid_config(
                "Concurrency must be at least 1",
            ));
        }
        Ok(value)
    }

    /// Validate a probability vector sums to one within `tolerance`
    ///
    /// # Errors
    /// - Any value outside `[0, 1]` or non-finite
    /// - Sum differs from 1 by more than `tolerance`
    pub fn validate_distribution(probabilities: &[f64], tolerance: f64) -> Result<()> {
        if let Some(bad) = probabilities
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(ClassifierError::internal(format!(
                "Probability {} outside [0, 1]",
                bad
            )));
        }

        let sum: f64 = probabilities.iter().sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(ClassifierError::internal(format!(
                "Probabilities sum to {}, expected 1",
                sum
            )));
        }
        Ok(())
    }
}
