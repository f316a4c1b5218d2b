//! Server error types.

use std::fmt;

use stackgate_core::SessionError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Startup configuration is unusable: bad bind address, unreadable TLS
    /// material, unknown identity API version or an unwritable audit log.
    /// The server does not start.
    Config(String),

    /// QUIC endpoint or stream failure. Fatal at bind time, otherwise it
    /// only ends the affected connection.
    Transport(String),

    /// Runner invariant broken, such as a command dispatched without
    /// resource handles.
    Internal(String),

    /// Session state machine was driven out of order. Ends that session.
    Session(SessionError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Session(err) => write!(f, "session error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}
