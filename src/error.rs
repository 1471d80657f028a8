//! Error types for the provisioning pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to generate authentication token: {0}")]
    Authentication(String),

    #[error("Failed to save order {order_id}: {reason}")]
    OrderSave { order_id: String, reason: String },

    #[error("Failed to start process: {0}")]
    ProcessStart(String),

    #[error("Order {0} not found")]
    OrderNotFound(String),

    #[error("Could not extract orderId from output")]
    Extraction,

    #[error("Fixture file not found at: {}", .0.display())]
    FixtureNotFound(PathBuf),

    #[error("Invalid OrderId: {0}. Must be a valid UUID.")]
    InvalidIdentifier(String),

    #[error("Fixture verification failed: {0}")]
    FixtureVerification(String),

    #[error("Page context was closed: {0}")]
    ContextClosed(String),

    #[error("Conditions not met after {attempts} attempt(s): {}", .unmet.join(", "))]
    ConditionTimeout { attempts: usize, unmet: Vec<String> },

    #[error("Test runner could not be executed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Whether a failed UI wait may be retried. A torn-down page context
    /// never recovers, so retrying it only burns the attempt budget.
    pub fn is_retryable_wait(&self) -> bool {
        !matches!(self, PipelineError::ContextClosed(_))
    }
}
