//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Alignment did not finish in time
    #[error("No alignment result after {seconds}s")]
    Timeout { seconds: u64 },

    /// Peer node error
    #[error(transparent)]
    Node(#[from] peer_node::NodeError),

    /// Transport setup error
    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }
}
