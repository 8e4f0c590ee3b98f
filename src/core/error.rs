//! Error types and handling for the MCP server.
//!
//! Startup can fail while building the registry or resolving the configured
//! profile; both are fatal and surface through [`Error`]. Errors raised while
//! serving a tool call never reach this type: they are reported to the
//! caller as tool results.

use thiserror::Error;

use crate::domains::tools::{DispatchError, RegistryError};

/// A specialized Result type for MCP server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Module registration failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Profile resolution or another dispatch-level failure at startup.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Transport failed to start or stopped with an error.
    #[error("Transport error: {0}")]
    Transport(#[from] super::transport::TransportError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from file operations or network communication.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors that should not occur under normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_errors_convert() {
        let err: Error = RegistryError::DuplicateModuleName("classes".into()).into();
        assert!(err.to_string().contains("classes"));

        let err: Error = DispatchError::unknown_modules(["ghost"]).into();
        assert!(matches!(err, Error::Dispatch(_)));
    }
}
