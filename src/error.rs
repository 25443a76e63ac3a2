//! Error types for node dispatch

use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching a command to a node
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The target node is not in the current fleet snapshot
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Preflight validation rejected the request before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Capability rejection absorbed by the planner's fallback path
    #[error("command not supported: {0}")]
    CommandUnsupported(String),

    /// The approval flow terminated the dispatch
    #[error("approval denied: {0}")]
    ApprovalDenied(String),

    /// Timeout or connectivity failure talking to the gateway
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable failure description
        message: String,
        /// Whether the call failed by exceeding its deadline
        timed_out: bool,
    },

    /// Error reported by the gateway, message preserved verbatim
    #[error("{0}")]
    Gateway(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a transport error for an exceeded deadline
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: true,
        }
    }

    /// Build a transport error for a connectivity failure
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Whether this error is a transport-level timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timed_out: true, .. })
    }
}
