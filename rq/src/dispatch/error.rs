//! Dispatch error types

use std::time::Duration;
use thiserror::Error;

use crate::rcon::ConnectionError;

/// Why a command did not produce a response
///
/// Cloneable so every holder of a result handle sees the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Timed out after {0:?} waiting for the connection lock")]
    DispatchTimeout(Duration),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Protocol failure: {0}")]
    ProtocolFailure(String),

    #[error("Dispatcher shut down before the command completed")]
    Abandoned,
}

impl CommandError {
    /// Check if this error came from the endpoint rather than local teardown
    pub fn is_transient(&self) -> bool {
        !matches!(self, CommandError::Abandoned)
    }
}

impl From<ConnectionError> for CommandError {
    fn from(err: ConnectionError) -> Self {
        if err.is_protocol() {
            CommandError::ProtocolFailure(err.to_string())
        } else {
            CommandError::ConnectionFailure(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_connection_error() {
        let err: CommandError = ConnectionError::Protocol("bad size 3".to_string()).into();
        assert!(matches!(err, CommandError::ProtocolFailure(_)));

        let err: CommandError = ConnectionError::AuthRejected.into();
        assert!(matches!(err, CommandError::ConnectionFailure(_)));

        let err: CommandError = ConnectionError::NotConnected.into();
        assert!(matches!(err, CommandError::ConnectionFailure(_)));
    }

    #[test]
    fn test_display() {
        let err = CommandError::DispatchTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Timed out after 5s waiting for the connection lock");
        assert_eq!(
            CommandError::Abandoned.to_string(),
            "Dispatcher shut down before the command completed"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(CommandError::ConnectionFailure("reset".to_string()).is_transient());
        assert!(!CommandError::Abandoned.is_transient());
    }
}
