use crate::core::connection_state::ConnectionError;
use thiserror::Error;

/// Main error type for wwks-link
#[derive(Error, Debug)]
pub enum LinkError {
    /// Host is not an IPv4 or IPv6 literal
    #[error("Invalid IP address: '{0}'")]
    InvalidAddress(String),

    /// Port outside 1..=65535
    #[error("Invalid port: {0}")]
    InvalidPort(i32),

    /// No socket is open
    #[error("Not connected")]
    NotConnected,

    /// Connection attempt failed with a classified error
    #[error("Connect failed ({error}): {reason}")]
    ConnectFailed {
        error: ConnectionError,
        reason: String,
    },

    /// Socket I/O error after the connection was established
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing left to send after removing illegal characters
    #[error("Message is empty after filtering")]
    EmptyMessage,

    /// Unterminated inbound data grew past the configured cap
    #[error("Inbound buffer exceeded {limit} bytes without a closing tag")]
    BufferOverflow { limit: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LinkError {
    /// Classify this error for the state-changed callback
    pub fn classify(&self) -> ConnectionError {
        match self {
            LinkError::ConnectFailed { error, .. } => *error,
            LinkError::Io(e) => ConnectionError::from_io(e),
            LinkError::InvalidAddress(_)
            | LinkError::InvalidPort(_)
            | LinkError::EmptyMessage
            | LinkError::Configuration(_) => ConnectionError::None,
            LinkError::NotConnected => ConnectionError::ConnectionReset,
            LinkError::BufferOverflow { .. } => ConnectionError::Other,
        }
    }
}

/// Result type for wwks-link operations
pub type Result<T> = std::result::Result<T, LinkError>;
