//! Layered error definitions
//!
//! Categorized by source: config / transport / codec / hand source

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Peer is not known to the transport
    #[error("unknown peer {peer}")]
    UnknownPeer { peer: u64 },

    /// Message could not be delivered
    #[error("transport '{transport}' send error: {message}")]
    TransportSend { transport: String, message: String },

    /// Transport closed
    #[error("transport '{transport}' closed")]
    TransportClosed { transport: String },

    // ===== Codec Errors =====
    /// Wire encode / decode error
    #[error("codec error: {message}")]
    Codec { message: String },

    // ===== Hand Source Errors =====
    /// Hand recording could not be loaded
    #[error("hand source '{source_name}' error: {message}")]
    HandSource {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport send error
    pub fn transport_send(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSend {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create hand source error
    pub fn hand_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = ContractError::config_validation("clock.offset_window_size", "must be > 0");
        assert_eq!(
            err.to_string(),
            "config validation error at 'clock.offset_window_size': must be > 0"
        );
    }

    #[test]
    fn test_unknown_peer_message() {
        let err = ContractError::UnknownPeer { peer: 7 };
        assert!(err.to_string().contains("7"));
    }
}
