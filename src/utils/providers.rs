//! `backend:provider` string parsing and availability listing

use crate::{
    config::{BackendType, ExecutionProvider},
    error::{ClassifierError, Result},
};
use serde::Serialize;

/// Information about a backend/provider combination
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and managing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse an execution provider string in format `backend:provider`
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use mri_classify::utils::ExecutionProviderManager;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:auto")?;
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider names
    /// - Tract combined with anything but `cpu`
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let normalized = provider_str.trim().to_ascii_lowercase();
        let (backend, provider) = match normalized.split_once(':') {
            Some((backend, provider)) => (backend, Some(provider)),
            None => (normalized.as_str(), None),
        };

        let backend_type = match backend {
            "onnx" => BackendType::Onnx,
            "tract" => BackendType::Tract,
            _ => {
                return Err(ClassifierError::invalid_config(format!(
                    "Unknown backend: {}. Supported backends: onnx, tract",
                    backend
                )));
            },
        };

        let Some(provider) = provider else {
            return Ok((backend_type, Self::default_provider_for_backend(backend_type)));
        };

        let execution_provider = match (backend_type, provider) {
            (BackendType::Onnx, "auto") => ExecutionProvider::Auto,
            (_, "cpu") => ExecutionProvider::Cpu,
            (BackendType::Onnx, "cuda") => ExecutionProvider::Cuda,
            (BackendType::Onnx, "coreml") => ExecutionProvider::CoreMl,
            (BackendType::Onnx, other) => {
                return Err(ClassifierError::invalid_config(format!(
                    "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, coreml",
                    other
                )));
            },
            (BackendType::Tract, other) => {
                return Err(ClassifierError::invalid_config(format!(
                    "Unknown Tract provider: {}. Tract only supports 'cpu'",
                    other
                )));
            },
        };

        Ok((backend_type, execution_provider))
    }

    /// Every combination with its availability in this build and on this host
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        let onnx_availability: Vec<(String, bool)> = crate::backends::OnnxBackend::list_providers()
            .into_iter()
            .map(|(name, available, _)| (name.to_lowercase(), available))
            .collect();
        #[cfg(not(feature = "onnx"))]
        let onnx_availability: Vec<(String, bool)> = Vec::new();

        let onnx_available = |name: &str| {
            onnx_availability
                .iter()
                .any(|(provider, available)| provider == name && *available)
        };
        let suffix = if cfg!(feature = "onnx") {
            ""
        } else {
            " (feature disabled)"
        };

        for (provider, available, description) in [
            (
                ExecutionProvider::Auto,
                onnx_availability.iter().any(|(_, available)| *available),
                "ONNX Runtime with auto-selected provider",
            ),
            (ExecutionProvider::Cpu, onnx_available("cpu"), "ONNX Runtime CPU execution"),
            (
                ExecutionProvider::Cuda,
                onnx_available("cuda"),
                "ONNX Runtime CUDA GPU acceleration",
            ),
            (
                ExecutionProvider::CoreMl,
                onnx_available("coreml"),
                "ONNX Runtime CoreML (Apple Silicon) acceleration",
            ),
        ] {
            providers.push(ProviderInfo {
                name: Self::provider_to_string(BackendType::Onnx, provider),
                backend_type: BackendType::Onnx,
                execution_provider: provider,
                available,
                description: format!("{}{}", description, suffix),
            });
        }

        providers.push(ProviderInfo {
            name: Self::provider_to_string(BackendType::Tract, ExecutionProvider::Cpu),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: if cfg!(feature = "tract") {
                "Pure Rust CPU inference via Tract".to_string()
            } else {
                "Pure Rust CPU inference via Tract (feature disabled)".to_string()
            },
        });

        providers
    }

    /// Whether a provider string parses
    #[must_use]
    pub fn is_valid_provider_string(provider_str: &str) -> bool {
        Self::parse_provider_string(provider_str).is_ok()
    }

    /// Get the default provider for a given backend type
    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract => ExecutionProvider::Cpu,
        }
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        format!("{}:{}", backend_type, provider)
    }
}
