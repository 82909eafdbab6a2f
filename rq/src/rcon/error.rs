//! RCON connection error types

use std::time::Duration;
use thiserror::Error;

/// Errors from the RCON connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected by server")]
    AuthRejected,

    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ConnectionError {
    /// Check if the server sent something we could not make sense of
    pub fn is_protocol(&self) -> bool {
        matches!(self, ConnectionError::Protocol(_))
    }
}
