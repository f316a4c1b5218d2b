//! Error types for the stackgate protocol core.
//!
//! Three layers, kept apart so each can be handled where it belongs:
//! - [`FacadeError`]: a cloud control-plane call failed
//! - [`CredentialError`]: the credential frame could not be parsed
//! - [`SessionError`]: the runtime drove the state machine out of order

use thiserror::Error;

use crate::session::{PendingCall, SessionState};

/// Errors returned by [`crate::ResourceFacade`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacadeError {
    /// The backend could not be reached (DNS, connect, TLS, reset)
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend refused the request (bad credentials, expired token,
    /// missing permission)
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-style status code returned by the backend
        status: u16,
        /// Backend-provided detail
        message: String,
    },

    /// Authentication reported success but produced no usable token
    #[error("identity service returned no access token")]
    MissingToken,

    /// The service catalog does not advertise a required service
    #[error("service catalog has no public {0} endpoint")]
    MissingEndpoint(String),

    /// The backend answered with something that could not be interpreted
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// Any other backend-side failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors parsing the `<username>,<password>,<project_id>` credential frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Frame did not split into exactly three fields
    #[error("expected 3 comma-separated fields, got {0}")]
    FieldCount(usize),
}

/// Errors from driving the session state machine.
///
/// These indicate a runtime bug, never a misbehaving client: client input is
/// always mapped to protocol frames, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation is not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A frame arrived while a facade call was still outstanding
    #[error("session busy: {pending:?} still pending")]
    Busy {
        /// Call the session is waiting on
        pending: PendingCall,
    },

    /// A facade result arrived that the session was not waiting for
    #[error("unexpected completion: expected {expected:?}, got {actual:?}")]
    UnexpectedCompletion {
        /// Call the session is waiting on, if any
        expected: Option<PendingCall>,
        /// Completion that was delivered
        actual: PendingCall,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        let err = SessionError::InvalidState {
            state: SessionState::Closed,
            operation: "handle_frame",
        };
        assert_eq!(err.to_string(), "invalid state transition: cannot handle_frame from Closed");

        let err = SessionError::Busy { pending: PendingCall::ImageListing };
        assert_eq!(err.to_string(), "session busy: ImageListing still pending");
    }

    #[test]
    fn credential_error_display() {
        assert_eq!(
            CredentialError::FieldCount(4).to_string(),
            "expected 3 comma-separated fields, got 4"
        );
    }
}
