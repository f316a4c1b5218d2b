//! Handshake authentication.
//!
//! The client sends one credential frame; the [`Authenticator`] asks the
//! facade to authenticate it and reduces the answer to [`AuthOutcome`].
//! Failure causes are kept for local diagnostics only. The client sees the
//! same `error` frame whatever went wrong.

use std::{fmt, sync::Arc};

use stackgate_proto::messages::CREDENTIAL_SEPARATOR;

use crate::{
    error::{CredentialError, FacadeError},
    facade::{ResourceFacade, ResourceHandles},
};

/// Login credentials for one handshake.
///
/// Consumed once and dropped. `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identity-service user name
    pub username: String,
    /// Identity-service password
    pub password: String,
    /// Project to scope the token to
    pub project_id: String,
    /// Identity-service base URL (from gateway configuration, not the client)
    pub auth_url: String,
}

impl Credentials {
    /// Parse a `<username>,<password>,<project_id>` frame.
    ///
    /// Fields are split on every comma with no escaping, so a comma inside a
    /// field makes the frame invalid.
    ///
    /// # Errors
    ///
    /// - `CredentialError::FieldCount` unless there are exactly three fields
    pub fn parse(frame: &str, auth_url: &str) -> Result<Self, CredentialError> {
        let fields: Vec<&str> = frame.split(CREDENTIAL_SEPARATOR).collect();

        let [username, password, project_id] = fields.as_slice() else {
            return Err(CredentialError::FieldCount(fields.len()));
        };

        Ok(Self {
            username: (*username).to_string(),
            password: (*password).to_string(),
            project_id: (*project_id).to_string(),
            auth_url: auth_url.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

/// Why a login was denied. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The credential frame was malformed
    Credentials(CredentialError),
    /// The facade refused or failed to authenticate
    Facade(FacadeError),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials(err) => write!(f, "malformed credentials: {err}"),
            Self::Facade(err) => write!(f, "{err}"),
        }
    }
}

/// Result of a login attempt.
///
/// Fail-closed: either every handle is present or none is.
pub enum AuthOutcome<F: ResourceFacade + ?Sized> {
    /// Credentials accepted; the session now owns these handles
    Granted(ResourceHandles<F>),
    /// Credentials rejected
    Denied(DenialReason),
}

impl<F: ResourceFacade + ?Sized> fmt::Debug for AuthOutcome<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted(handles) => f.debug_tuple("Granted").field(handles).finish(),
            Self::Denied(reason) => f.debug_tuple("Denied").field(reason).finish(),
        }
    }
}

/// Validates credentials through a [`ResourceFacade`].
pub struct Authenticator<F: ResourceFacade> {
    facade: Arc<F>,
}

impl<F: ResourceFacade> Authenticator<F> {
    /// Create an authenticator over a shared facade.
    pub fn new(facade: Arc<F>) -> Self {
        Self { facade }
    }

    /// Authenticate `credentials`.
    ///
    /// Every facade error becomes [`AuthOutcome::Denied`] with the cause
    /// attached for diagnostics. There is no partial success.
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthOutcome<F> {
        match self.facade.authenticate(credentials).await {
            Ok(handles) => AuthOutcome::Granted(handles),
            Err(err) => AuthOutcome::Denied(DenialReason::Facade(err)),
        }
    }
}

impl<F: ResourceFacade> Clone for Authenticator<F> {
    fn clone(&self) -> Self {
        Self { facade: Arc::clone(&self.facade) }
    }
}
