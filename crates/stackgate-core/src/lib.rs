//! Stackgate protocol core.
//!
//! Pure protocol logic with no I/O. The [`Session`] state machine consumes
//! received frames and facade results and returns [`SessionAction`]s for a
//! runtime to execute. This keeps the handshake and the command dispatcher
//! testable without sockets or a cloud backend.
//!
//! # Components
//!
//! - [`Session`]: per-connection state machine (handshake + command dispatch)
//! - [`ResourceFacade`]: the contract a cloud control-plane adapter fulfils
//! - [`Authenticator`]: collapses facade authentication into a fail-closed
//!   [`AuthOutcome`]
//! - [`AuditEvent`]: connection and login events for the audit trail

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod auth;
pub mod error;
pub mod facade;
pub mod session;

pub use audit::AuditEvent;
pub use auth::{AuthOutcome, Authenticator, Credentials, DenialReason};
pub use error::{CredentialError, FacadeError, SessionError};
pub use facade::{InstanceRequest, ResourceFacade, ResourceHandles, ResourceRecord};
pub use session::{LogLevel, PendingCall, Session, SessionAction, SessionState};
