//! Error types for MRI classification operations

use thiserror::Error;

/// Result type alias for classification operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Error types for the classification pipeline
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Model or label artifact missing, unreadable or malformed
    #[error("Load error: {0}")]
    Load(String),

    /// Input bytes could not be turned into a pixel grid
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    /// The loaded model does not produce the expected output
    #[error("Model output error: {0}")]
    ModelOutput(String),

    /// Backend execution failures
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP errors while fetching remote artifacts
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The four failure classes a caller of the pipeline distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Artifact missing or corrupt, not recoverable without fixing it
    Load,
    /// Bad input image, recoverable by supplying different input
    Preprocessing,
    /// Artifact/version mismatch, never retried
    ModelOutput,
    /// Anything else
    Internal,
}

impl ClassifierError {
    /// Create a new load error
    pub fn load<S: Into<String>>(msg: S) -> Self {
        Self::Load(msg.into())
    }

    /// Create a new preprocessing error
    pub fn preprocessing<S: Into<String>>(msg: S) -> Self {
        Self::Preprocessing(msg.into())
    }

    /// Create a new model output error
    pub fn model_output<S: Into<String>>(msg: S) -> Self {
        Self::ModelOutput(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with operation context
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{}: {}", operation, error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create artifact load error with troubleshooting context
    pub fn artifact_error_with_context(
        operation: &str,
        artifact: &str,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Load(format!(
            "Failed to {} '{}': {}.{}",
            operation, artifact, error, suggestion_text
        ))
    }

    /// Map this error onto the pipeline failure taxonomy
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(_) => ErrorKind::Load,
            Self::Preprocessing(_) => ErrorKind::Preprocessing,
            Self::ModelOutput(_) => ErrorKind::ModelOutput,
            Self::Inference(_)
            | Self::InvalidConfig(_)
            | Self::Io(_)
            | Self::Network(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure was caused by the caller's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::Preprocessing
    }

    /// Re-wrap any failure raised while loading an artifact as a load error
    #[must_use]
    pub fn into_load_error(self, artifact: &str) -> Self {
        match self {
            Self::Load(_) => self,
            other => Self::Load(format!("{}: {}", artifact, other)),
        }
    }
}
