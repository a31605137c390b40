// --- File: crates/courtside_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all Courtside errors.
///
/// Collaborator implementations (platform bridges, stores) report failures
/// through this type; the push crate maps it into its own error channel.
#[derive(Error, Debug)]
pub enum CourtsideError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Missing or expired credentials
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from the persistent key-value store
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Error reported by the OS notification platform
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

// Common error conversions
impl From<reqwest::Error> for CourtsideError {
    fn from(err: reqwest::Error) -> Self {
        CourtsideError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for CourtsideError {
    fn from(err: serde_json::Error) -> Self {
        CourtsideError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for CourtsideError {
    fn from(err: std::io::Error) -> Self {
        CourtsideError::StorageError(err.to_string())
    }
}

// Utility functions for error handling
pub fn auth_error<T: fmt::Display>(message: T) -> CourtsideError {
    CourtsideError::AuthError(message.to_string())
}

pub fn storage_error<T: fmt::Display>(message: T) -> CourtsideError {
    CourtsideError::StorageError(message.to_string())
}

pub fn platform_error<T: fmt::Display>(message: T) -> CourtsideError {
    CourtsideError::PlatformError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_become_storage_errors() {
        let err: CourtsideError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into();
        assert!(matches!(err, CourtsideError::StorageError(_)));
    }
}
