//! Prediction telemetry sinks
//!
//! A sink is notified after every successful prediction. Sink failures are
//! reported to the caller's log but never change the analysis result.

use crate::error::{ClassifierError, Result};
use crate::types::Prediction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One logged prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    /// File name or other caller-supplied identifier of the input
    pub source: String,
    pub label: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    #[must_use]
    pub fn from_prediction(source: &str, prediction: &Prediction) -> Self {
        Self {
            source: source.to_string(),
            label: prediction.label().to_string(),
            confidence: prediction.confidence(),
            created_at: Utc::now(),
        }
    }
}

/// Receiver of prediction records
#[async_trait]
pub trait PredictionSink: Send + Sync {
    /// Persist or forward one record
    ///
    /// # Errors
    /// - Sink-specific write failures
    async fn record(&self, record: &PredictionRecord) -> Result<()>;
}

/// Sink that discards every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

#[async_trait]
impl PredictionSink for NoOpSink {
    async fn record(&self, _record: &PredictionRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    // serializes appends from concurrent analyses
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PredictionSink for JsonLinesSink {
    async fn record(&self, record: &PredictionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(|e| {
            ClassifierError::internal(format!("Failed to serialize prediction record: {}", e))
        })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ClassifierError::file_io_error("open prediction log", &self.path, &e))?;

        file.write_all(&line)
            .await
            .map_err(|e| ClassifierError::file_io_error("append to prediction log", &self.path, &e))?;
        file.flush()
            .await
            .map_err(|e| ClassifierError::file_io_error("flush prediction log", &self.path, &e))?;

        Ok(())
    }
}
