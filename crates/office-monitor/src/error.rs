//! Error types for the office monitor.

use thiserror::Error;

/// Errors raised while ingesting messages or talking to collaborators.
#[derive(Error, Debug, Clone)]
pub enum MonitorError {
    // Malformed input
    #[error("Unrecognized topic '{topic}'")]
    UnrecognizedTopic { topic: String },

    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    // Device twin
    #[error("Desired configuration for office '{office_id}' is incomplete: missing {missing}")]
    IncompleteDesired { office_id: String, missing: String },

    // Collaborator failures
    #[error("Store error: {reason}")]
    Store { reason: String },

    #[error("Lookup error: {reason}")]
    Lookup { reason: String },

    // Configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("IO error: {reason}")]
    Io { reason: String },
}

impl MonitorError {
    /// Whether the error came from bad input rather than a failing dependency.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedTopic { .. } | Self::InvalidPayload { .. } | Self::InvalidField { .. }
        )
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for MonitorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
