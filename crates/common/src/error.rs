//! Error types for Taskbridge

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the bridge error
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// Backend failures keep the native driver message as their display text so
/// the calling step reports exactly what the database said.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("{0}")]
    Backend(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Environment file error: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Stable machine-readable kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Configuration(_) | BridgeError::EnvFile(_) => "configuration",
            BridgeError::Connection(_) => "connection",
            BridgeError::UnsupportedOperation(_) => "unsupported_operation",
            BridgeError::InvalidRequest(_) | BridgeError::Json(_) => "invalid_request",
            BridgeError::UnknownTask(_) => "unknown_task",
            BridgeError::Backend(_) => "backend",
            BridgeError::AssertionFailed(_) => "assertion",
            BridgeError::Io(_) => "io",
        }
    }

    /// Message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            BridgeError::Configuration(m)
            | BridgeError::Connection(m)
            | BridgeError::UnsupportedOperation(m)
            | BridgeError::InvalidRequest(m)
            | BridgeError::UnknownTask(m)
            | BridgeError::Backend(m)
            | BridgeError::AssertionFailed(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

/// Error payload carried across the task boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&BridgeError> for ErrorBody {
    fn from(e: &BridgeError) -> Self {
        Self {
            error: e.kind().to_string(),
            message: e.message(),
        }
    }
}

impl From<ErrorBody> for BridgeError {
    fn from(body: ErrorBody) -> Self {
        match body.error.as_str() {
            "configuration" => BridgeError::Configuration(body.message),
            "connection" => BridgeError::Connection(body.message),
            "unsupported_operation" => BridgeError::UnsupportedOperation(body.message),
            "invalid_request" => BridgeError::InvalidRequest(body.message),
            "unknown_task" => BridgeError::UnknownTask(body.message),
            "assertion" => BridgeError::AssertionFailed(body.message),
            _ => BridgeError::Backend(body.message),
        }
    }
}
