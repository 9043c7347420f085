use std::io;
use thiserror::Error;

/// Custom error type for the fan controller
#[derive(Error, Debug)]
pub enum FanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Status server error: {0}")]
    Server(String),
}

/// Result type alias for the fan controller
pub type Result<T> = std::result::Result<T, FanError>;

impl FanError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        FanError::Config(msg.into())
    }

    /// Create a publish error
    pub fn publish<S: Into<String>>(msg: S) -> Self {
        FanError::Publish(msg.into())
    }

    pub fn probe<S: Into<String>>(msg: S) -> Self {
        FanError::Probe(msg.into())
    }

    pub fn server<S: Into<String>>(msg: S) -> Self {
        FanError::Server(msg.into())
    }
}
