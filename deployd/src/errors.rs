//! Error types for deployd

use thiserror::Error;

/// Main error type for deployd
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Provisioning of deployment {deployment_id} failed: {cause}")]
    ProvisionError {
        deployment_id: String,
        cause: String,
    },

    #[error("Deployment {deployment_id} could not bind port {port}: {cause}")]
    BindError {
        deployment_id: String,
        port: u16,
        cause: String,
    },

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl PlatformError {
    pub fn provision(deployment_id: &str, cause: impl std::fmt::Display) -> Self {
        PlatformError::ProvisionError {
            deployment_id: deployment_id.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Whether the error was caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(self, PlatformError::ValidationError(_))
    }
}
