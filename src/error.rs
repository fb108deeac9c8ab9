//! Custom error types for the control client.
//!
//! This module defines the primary error type, `ControlError`, shared by the
//! library and the `wificar` binary. Using the `thiserror` crate, it gives a
//! single place to describe everything that can go wrong while talking to the
//! car, from configuration problems to transport failures.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type
//!   mismatches in `wificar.toml` / `WIFICAR_*` variables.
//! - **`Configuration`**: Semantic errors found by `ControlConfig::validate`,
//!   such as a zero heartbeat interval.
//! - **`Endpoint`**: The device host could not be turned into valid URLs.
//! - **`Transport`** / **`ConnectTimeout`**: The control channel could not be
//!   opened or a write to it failed. Inside the connection manager these never
//!   escape to callers; they are folded into the `Closed` state.
//! - **`NotConnected`** / **`ManagerClosed`**: Returned by handle operations
//!   that need a live connection or a running manager.
//!
//! Inbound protocol problems (unknown or malformed device messages) are *not*
//! errors; the connection manager ignores them.

use std::time::Duration;

use thiserror::Error;

use crate::endpoint::EndpointError;

/// Convenience alias for results using the client error type.
pub type AppResult<T> = std::result::Result<T, ControlError>;

/// Errors produced by the control client.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The device host does not produce valid endpoint URLs.
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    /// Opening or writing to the control channel failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The control channel did not open in time.
    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// An operation needed an open control channel.
    #[error("Control channel is not open")]
    NotConnected,

    /// The connection manager task is no longer running.
    #[error("Connection manager has shut down")]
    ManagerClosed,

    /// A user-supplied command string is not part of the wire protocol.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Tracing subscriber could not be installed.
    #[error("Logging initialization failed: {0}")]
    Logging(String),

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Returns true if the error is expected to clear up by reconnecting.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectTimeout(_) | Self::NotConnected | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retriable() {
        assert!(ControlError::Transport("connection refused".into()).is_retriable());
        assert!(ControlError::ConnectTimeout(Duration::from_secs(5)).is_retriable());
        assert!(ControlError::NotConnected.is_retriable());
    }

    #[test]
    fn configuration_errors_are_not_retriable() {
        assert!(!ControlError::Configuration("bad".into()).is_retriable());
        assert!(!ControlError::UnknownCommand("jump".into()).is_retriable());
        assert!(!ControlError::ManagerClosed.is_retriable());
    }

    #[test]
    fn display_includes_detail() {
        let err = ControlError::UnknownCommand("jump".into());
        assert_eq!(err.to_string(), "Unknown command: jump");

        let err = ControlError::ConnectTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
