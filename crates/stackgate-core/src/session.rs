//! Session state machine.
//!
//! Runs the authentication handshake and the command dispatcher for one
//! connection. Uses the action pattern: methods take received frames or
//! facade results as input and return actions for the runtime to execute.
//! The state machine never performs I/O and never calls the facade itself.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  start   ┌─────────────────────┐  Granted   ┌───────┐
//! │ Init │─────────>│ AwaitingCredentials │───────────>│ Ready │<─┐ command
//! └──────┘          └─────────────────────┘            └───────┘──┘
//!                             │ Denied / malformed          │ peer closed
//!                             ↓                             ↓
//!                        ┌────────┐                    ┌────────┐
//!                        │ Closed │                    │ Closed │
//!                        └────────┘                    └────────┘
//! ```
//!
//! Transitions only move forward. There is no re-authentication on a
//! connection.
//!
//! # Facade calls
//!
//! A received frame that needs the backend yields [`SessionAction::Authenticate`],
//! [`SessionAction::ListImages`] or [`SessionAction::PrepareInstance`]. The
//! runtime performs the call and feeds the result back through the matching
//! `complete_*` method. Until then the session is [`PendingCall`]-busy and
//! refuses further frames, which keeps processing strictly one command at a
//! time.

use std::net::SocketAddr;

use stackgate_proto::{Command, FrameHeader, messages};

use crate::{
    audit::AuditEvent,
    auth::{AuthOutcome, Credentials, DenialReason},
    error::{FacadeError, SessionError},
    facade::{ResourceFacade, ResourceHandles, ResourceRecord},
};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, prompt not yet sent
    Init,
    /// Prompt sent, waiting for the credential frame
    AwaitingCredentials,
    /// Authenticated, dispatching commands
    Ready,
    /// Terminal
    Closed,
}

/// Facade call the session is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCall {
    /// `authenticate`
    Authentication,
    /// `list_images` for `lsimage`
    ImageListing,
    /// `list_flavors` + `list_networks` for `createInstance`
    InstancePreparation,
}

/// Log levels for session diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Warning
    Warn,
}

/// Actions returned by the session state machine.
///
/// The runtime executes these in order:
/// - `Send`: write one text frame to the client
/// - `Authenticate` / `ListImages` / `PrepareInstance`: call the facade and
///   report back through the matching `complete_*` method
/// - `Audit`: append to the audit trail
/// - `Log`: emit a local diagnostic
/// - `Close`: stop reading and close the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this text frame to the client
    Send(String),

    /// Authenticate these credentials
    Authenticate(Credentials),

    /// List images with the session's image handle
    ListImages,

    /// List flavors and networks with the session's compute and network
    /// handles. The two lookups are independent and may run concurrently.
    PrepareInstance,

    /// Record an audit event
    Audit(AuditEvent),

    /// Emit a diagnostic that never reaches the client
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },

    /// Close the connection with this reason
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Per-connection session.
///
/// Owns the resource handles once authenticated. `handles` is `Some` exactly
/// when the state is [`SessionState::Ready`].
pub struct Session<F: ResourceFacade> {
    /// Current state
    state: SessionState,
    /// Client address, used for audit events only
    remote: SocketAddr,
    /// Identity-service URL attached to parsed credentials
    auth_url: String,
    /// Service handles, present only while Ready
    handles: Option<ResourceHandles<F>>,
    /// Outstanding facade call
    pending: Option<PendingCall>,
    /// Whether the disconnect has been reported
    disconnect_reported: bool,
}

impl<F: ResourceFacade> Session<F> {
    /// Create a session in [`SessionState::Init`] state.
    pub fn new(remote: SocketAddr, auth_url: impl Into<String>) -> Self {
        Self {
            state: SessionState::Init,
            remote,
            auth_url: auth_url.into(),
            handles: None,
            pending: None,
            disconnect_reported: false,
        }
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Service handles. `None` unless Ready.
    #[must_use]
    pub fn handles(&self) -> Option<&ResourceHandles<F>> {
        self.handles.as_ref()
    }

    /// Facade call currently outstanding, if any.
    #[must_use]
    pub fn pending(&self) -> Option<PendingCall> {
        self.pending
    }

    /// True once the session reached [`SessionState::Closed`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Begin the handshake.
    ///
    /// Transitions to `AwaitingCredentials` and returns the prompt.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not in Init state
    pub fn start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Init {
            return Err(SessionError::InvalidState { state: self.state, operation: "start" });
        }

        self.state = SessionState::AwaitingCredentials;

        Ok(vec![
            SessionAction::Audit(AuditEvent::ConnectionAccepted { peer: self.remote }),
            SessionAction::Send(messages::AUTH_INITIATED.to_string()),
        ])
    }

    /// Process one frame received from the client.
    ///
    /// While awaiting credentials the frame is the credential triple. Once
    /// Ready it is a command. Unrecognized commands produce no actions.
    ///
    /// # Errors
    ///
    /// - `SessionError::Busy` if a facade call is outstanding
    /// - `SessionError::InvalidState` in Init or Closed state
    pub fn handle_frame(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        if let Some(pending) = self.pending {
            return Err(SessionError::Busy { pending });
        }

        match self.state {
            SessionState::AwaitingCredentials => Ok(self.handle_credentials(text)),
            SessionState::Ready => Ok(self.dispatch(Command::parse(text))),
            state => Err(SessionError::InvalidState { state, operation: "handle_frame" }),
        }
    }

    fn handle_credentials(&mut self, text: &str) -> Vec<SessionAction> {
        match Credentials::parse(text, &self.auth_url) {
            Ok(credentials) => {
                self.pending = Some(PendingCall::Authentication);
                vec![SessionAction::Authenticate(credentials)]
            },
            Err(err) => self.deny(&DenialReason::Credentials(err)),
        }
    }

    fn dispatch(&mut self, command: Command) -> Vec<SessionAction> {
        match command {
            Command::ListImages => {
                self.pending = Some(PendingCall::ImageListing);
                vec![SessionAction::ListImages]
            },
            Command::CreateInstance => {
                self.pending = Some(PendingCall::InstancePreparation);
                vec![SessionAction::PrepareInstance]
            },
            Command::Unrecognized(text) => vec![SessionAction::Log {
                level: LogLevel::Debug,
                message: format!("ignoring unrecognized command ({} bytes)", text.len()),
            }],
        }
    }

    /// Deliver the result of [`SessionAction::Authenticate`].
    ///
    /// On grant: sends `success` and the completion banner, stores the
    /// handles, and transitions to Ready. On denial: sends `error` and the
    /// failure banner, closes the session, and asks the runtime to close the
    /// channel.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedCompletion` if authentication was not
    ///   pending
    pub fn complete_authentication(
        &mut self,
        outcome: AuthOutcome<F>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.take_pending(PendingCall::Authentication)?;
        debug_assert_eq!(self.state, SessionState::AwaitingCredentials);

        match outcome {
            AuthOutcome::Granted(handles) => {
                self.handles = Some(handles);
                self.state = SessionState::Ready;

                Ok(vec![
                    SessionAction::Send(messages::AUTH_SUCCESS.to_string()),
                    SessionAction::Send(messages::AUTH_COMPLETED.to_string()),
                    SessionAction::Audit(AuditEvent::LoginSucceeded { peer: self.remote }),
                ])
            },
            AuthOutcome::Denied(reason) => Ok(self.deny(&reason)),
        }
    }

    fn deny(&mut self, reason: &DenialReason) -> Vec<SessionAction> {
        self.state = SessionState::Closed;
        self.handles = None;

        vec![
            SessionAction::Log {
                level: LogLevel::Warn,
                message: format!("authentication denied: {reason}"),
            },
            SessionAction::Send(messages::AUTH_ERROR.to_string()),
            SessionAction::Send(messages::AUTH_FAILED.to_string()),
            SessionAction::Audit(AuditEvent::LoginFailed { peer: self.remote }),
            SessionAction::Close { reason: "authentication failed".to_string() },
        ]
    }

    /// Deliver the result of [`SessionAction::ListImages`].
    ///
    /// A listing too large for one frame is reported like a failed lookup;
    /// the session stays Ready either way.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedCompletion` if an image listing was not
    ///   pending
    pub fn complete_image_listing(
        &mut self,
        result: Result<Vec<ResourceRecord>, FacadeError>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.take_pending(PendingCall::ImageListing)?;

        let actions = match Listing::from_result("images", result) {
            Listing::Empty => vec![SessionAction::Send(messages::NO_IMAGES.to_string())],
            Listing::Rendered(text) => vec![SessionAction::Send(text)],
            Listing::Failed(message) => vec![
                SessionAction::Log { level: LogLevel::Warn, message },
                SessionAction::Send(messages::IMAGE_LISTING_FAILED.to_string()),
            ],
        };

        Ok(actions)
    }

    /// Deliver the results of [`SessionAction::PrepareInstance`].
    ///
    /// Each list is reported on its own: an empty or failed flavor lookup
    /// does not hide the state of the network lookup. Only when both lists
    /// are non-empty are the two listings sent, flavors first. No instance
    /// is created.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedCompletion` if instance preparation was not
    ///   pending
    pub fn complete_instance_preparation(
        &mut self,
        flavors: Result<Vec<ResourceRecord>, FacadeError>,
        networks: Result<Vec<ResourceRecord>, FacadeError>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.take_pending(PendingCall::InstancePreparation)?;

        let flavors = Listing::from_result("flavors", flavors);
        let networks = Listing::from_result("networks", networks);
        let mut actions = Vec::new();

        match (flavors, networks) {
            (Listing::Rendered(flavors), Listing::Rendered(networks)) => {
                actions.push(SessionAction::Send(flavors));
                actions.push(SessionAction::Send(networks));
            },
            (flavors, networks) => {
                flavors.report_shortfall(
                    messages::NO_FLAVORS,
                    messages::FLAVOR_LISTING_FAILED,
                    &mut actions,
                );
                networks.report_shortfall(
                    messages::NO_NETWORKS,
                    messages::NETWORK_LISTING_FAILED,
                    &mut actions,
                );
            },
        }

        Ok(actions)
    }

    /// Mark the session as closed and release its handles.
    ///
    /// Called by the runtime when the channel ends for any reason. Reports
    /// the disconnect exactly once; later calls return no actions.
    pub fn close(&mut self) -> Vec<SessionAction> {
        self.state = SessionState::Closed;
        self.handles = None;
        self.pending = None;

        if self.disconnect_reported {
            return Vec::new();
        }
        self.disconnect_reported = true;

        vec![SessionAction::Audit(AuditEvent::Disconnected { peer: self.remote })]
    }

    fn take_pending(&mut self, actual: PendingCall) -> Result<(), SessionError> {
        if self.pending != Some(actual) {
            return Err(SessionError::UnexpectedCompletion { expected: self.pending, actual });
        }

        self.pending = None;
        Ok(())
    }
}

/// A facade listing reduced to what the client will be told.
enum Listing {
    Empty,
    Rendered(String),
    /// Lookup failed or the rendered listing does not fit in one frame.
    /// Carries the diagnostic for the local log.
    Failed(String),
}

impl Listing {
    fn from_result(what: &str, result: Result<Vec<ResourceRecord>, FacadeError>) -> Self {
        let records = match result {
            Ok(records) if records.is_empty() => return Self::Empty,
            Ok(records) => records,
            Err(err) => return Self::Failed(format!("listing {what} failed: {err}")),
        };

        let text = ResourceRecord::render_listing(&records);
        if text.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Self::Failed(format!(
                "{} {what} render to {} bytes, over the {} byte frame limit",
                records.len(),
                text.len(),
                FrameHeader::MAX_PAYLOAD_SIZE
            ));
        }

        Self::Rendered(text)
    }

    /// Push the frames for a listing that is not sent as-is: the sentinel
    /// when empty, the failure frame when it failed. A rendered listing
    /// whose counterpart fell short is not sent.
    fn report_shortfall(self, empty: &str, failed: &str, actions: &mut Vec<SessionAction>) {
        match self {
            Self::Empty => actions.push(SessionAction::Send(empty.to_string())),
            Self::Rendered(_) => {},
            Self::Failed(message) => {
                actions.push(SessionAction::Log { level: LogLevel::Warn, message });
                actions.push(SessionAction::Send(failed.to_string()));
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::facade::InstanceRequest;

    struct NullFacade;

    #[async_trait]
    impl ResourceFacade for NullFacade {
        type Compute = u8;
        type Image = u8;
        type Network = u8;

        async fn authenticate(
            &self,
            _: &Credentials,
        ) -> Result<ResourceHandles<Self>, FacadeError> {
            Ok(ResourceHandles::new(1, 2, 3))
        }

        async fn list_images(&self, _: &u8) -> Result<Vec<ResourceRecord>, FacadeError> {
            Ok(vec![])
        }

        async fn list_flavors(&self, _: &u8) -> Result<Vec<ResourceRecord>, FacadeError> {
            Ok(vec![])
        }

        async fn list_networks(&self, _: &u8) -> Result<Vec<ResourceRecord>, FacadeError> {
            Ok(vec![])
        }

        async fn create_instance(
            &self,
            _: &u8,
            _: &InstanceRequest,
        ) -> Result<ResourceRecord, FacadeError> {
            Err(FacadeError::Backend("unsupported".to_string()))
        }
    }

    fn peer() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    fn new_session() -> Session<NullFacade> {
        Session::new(peer(), "http://keystone.test/identity")
    }

    fn ready_session() -> Session<NullFacade> {
        let mut session = new_session();
        session.start().unwrap();
        session.handle_frame("admin,secret,proj").unwrap();
        session
            .complete_authentication(AuthOutcome::Granted(ResourceHandles::new(1, 2, 3)))
            .unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session
    }

    fn sent(actions: &[SessionAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Send(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn flavors() -> Vec<ResourceRecord> {
        vec![ResourceRecord::new("1", "m1.tiny"), ResourceRecord::new("2", "m1.small")]
    }

    fn networks() -> Vec<ResourceRecord> {
        vec![ResourceRecord::new("net-a", "private")]
    }

    #[test]
    fn session_lifecycle() {
        let mut session = new_session();
        assert_eq!(session.state(), SessionState::Init);
        assert!(session.handles().is_none());

        let actions = session.start().unwrap();
        assert_eq!(session.state(), SessionState::AwaitingCredentials);
        assert_eq!(sent(&actions), vec![messages::AUTH_INITIATED]);
        assert!(actions.contains(&SessionAction::Audit(AuditEvent::ConnectionAccepted {
            peer: peer()
        })));

        let actions = session.handle_frame("admin,secret,proj").unwrap();
        assert_eq!(session.pending(), Some(PendingCall::Authentication));
        match &actions[..] {
            [SessionAction::Authenticate(creds)] => {
                assert_eq!(creds.username, "admin");
                assert_eq!(creds.project_id, "proj");
                assert_eq!(creds.auth_url, "http://keystone.test/identity");
            },
            other => panic!("expected Authenticate action, got {other:?}"),
        }

        let actions = session
            .complete_authentication(AuthOutcome::Granted(ResourceHandles::new(1, 2, 3)))
            .unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(sent(&actions), vec![messages::AUTH_SUCCESS, messages::AUTH_COMPLETED]);
        let audited = SessionAction::Audit(AuditEvent::LoginSucceeded { peer: peer() });
        assert!(actions.contains(&audited));
        assert_eq!(session.handles().map(|h| (h.compute, h.image, h.network)), Some((1, 2, 3)));

        let actions = session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.handles().is_none());
        assert_eq!(actions, vec![SessionAction::Audit(AuditEvent::Disconnected { peer: peer() })]);
    }

    #[test]
    fn denied_login_sends_error_and_closes() {
        let mut session = new_session();
        session.start().unwrap();
        session.handle_frame("u,p,proj").unwrap();

        let actions = session
            .complete_authentication(AuthOutcome::Denied(DenialReason::Facade(
                FacadeError::Rejected { status: 401, message: "nope".to_string() },
            )))
            .unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.handles().is_none());
        assert_eq!(sent(&actions), vec![messages::AUTH_ERROR, messages::AUTH_FAILED]);
        assert!(actions.contains(&SessionAction::Audit(AuditEvent::LoginFailed { peer: peer() })));
        assert!(matches!(actions.last(), Some(SessionAction::Close { .. })));
    }

    #[test]
    fn denial_cause_is_logged_not_sent() {
        let mut session = new_session();
        session.start().unwrap();
        session.handle_frame("u,p,proj").unwrap();

        let actions = session
            .complete_authentication(AuthOutcome::Denied(DenialReason::Facade(
                FacadeError::Unreachable("connection refused".to_string()),
            )))
            .unwrap();

        assert!(sent(&actions).iter().all(|text| !text.contains("refused")));
        assert!(actions.iter().any(|a| matches!(
            a,
            SessionAction::Log { level: LogLevel::Warn, message } if message.contains("refused")
        )));
    }

    #[test]
    fn malformed_credentials_fail_without_facade_call() {
        let mut session = new_session();
        session.start().unwrap();

        let actions = session.handle_frame("lsimage").unwrap();

        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Authenticate(_))));
        assert_eq!(sent(&actions), vec![messages::AUTH_ERROR, messages::AUTH_FAILED]);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.pending(), None);
    }

    #[test]
    fn frames_rejected_while_authentication_pending() {
        let mut session = new_session();
        session.start().unwrap();
        session.handle_frame("admin,secret,proj").unwrap();

        let result = session.handle_frame("lsimage");
        assert_eq!(result, Err(SessionError::Busy { pending: PendingCall::Authentication }));
    }

    #[test]
    fn frames_rejected_before_start_and_after_close() {
        let mut session = new_session();
        assert!(matches!(
            session.handle_frame("lsimage"),
            Err(SessionError::InvalidState { state: SessionState::Init, .. })
        ));

        session.start().unwrap();
        session.close();
        assert!(matches!(
            session.handle_frame("lsimage"),
            Err(SessionError::InvalidState { state: SessionState::Closed, .. })
        ));
    }

    #[test]
    fn start_twice_is_invalid() {
        let mut session = new_session();
        session.start().unwrap();
        assert!(matches!(session.start(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn disconnect_reported_once() {
        let mut session = ready_session();
        assert_eq!(session.close().len(), 1);
        assert!(session.close().is_empty());
    }

    #[test]
    fn disconnect_reported_after_denied_login() {
        let mut session = new_session();
        session.start().unwrap();
        session.handle_frame("bad").unwrap();
        assert!(session.is_closed());

        assert_eq!(session.close(), vec![SessionAction::Audit(AuditEvent::Disconnected {
            peer: peer()
        })]);
    }

    #[test]
    fn lsimage_empty_sends_sentinel() {
        let mut session = ready_session();
        assert_eq!(session.handle_frame("lsimage").unwrap(), vec![SessionAction::ListImages]);

        let actions = session.complete_image_listing(Ok(vec![])).unwrap();
        assert_eq!(sent(&actions), vec!["NO IMAGES AVAILABLE CURRENTLY. CONTACT  ADMIN"]);
        assert_eq!(session.pending(), None);
    }

    #[test]
    fn lsimage_renders_listing_in_order() {
        let mut session = ready_session();
        session.handle_frame("lsimage").unwrap();

        let images =
            vec![ResourceRecord::new("img-2", "ubuntu"), ResourceRecord::new("img-1", "cirros")];
        let actions = session.complete_image_listing(Ok(images)).unwrap();
        assert_eq!(sent(&actions), vec!["img-2 : ubuntu\nimg-1 : cirros"]);
    }

    #[test]
    fn lsimage_failure_sends_error_frame_and_stays_ready() {
        let mut session = ready_session();
        session.handle_frame("lsimage").unwrap();

        let actions = session
            .complete_image_listing(Err(FacadeError::Backend("HTTP 503".to_string())))
            .unwrap();
        assert_eq!(sent(&actions), vec![messages::IMAGE_LISTING_FAILED]);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.handles().is_some());
    }

    /// One record whose rendering alone exceeds a frame.
    fn oversized() -> Vec<ResourceRecord> {
        let name = "x".repeat(FrameHeader::MAX_PAYLOAD_SIZE as usize);
        vec![ResourceRecord::new("big", name)]
    }

    #[test]
    fn lsimage_listing_larger_than_a_frame_is_reported_as_failure() {
        let mut session = ready_session();
        session.handle_frame("lsimage").unwrap();

        let actions = session.complete_image_listing(Ok(oversized())).unwrap();
        assert_eq!(sent(&actions), vec![messages::IMAGE_LISTING_FAILED]);
        let warned =
            actions.iter().any(|a| matches!(a, SessionAction::Log { level: LogLevel::Warn, .. }));
        assert!(warned);
        assert_eq!(session.state(), SessionState::Ready);

        // The next command is still served
        session.handle_frame("lsimage").unwrap();
        let actions = session.complete_image_listing(Ok(vec![])).unwrap();
        assert_eq!(sent(&actions), vec![messages::NO_IMAGES]);
    }

    #[test]
    fn create_instance_oversized_list_is_reported_per_list() {
        let mut session = ready_session();
        session.handle_frame("createInstance").unwrap();

        let actions = session.complete_instance_preparation(Ok(oversized()), Ok(vec![])).unwrap();
        assert_eq!(sent(&actions), vec![messages::FLAVOR_LISTING_FAILED, messages::NO_NETWORKS]);

        session.handle_frame("createInstance").unwrap();
        let actions =
            session.complete_instance_preparation(Ok(flavors()), Ok(oversized())).unwrap();
        assert_eq!(sent(&actions), vec![messages::NETWORK_LISTING_FAILED]);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn create_instance_with_both_lists_sends_flavors_then_networks() {
        let mut session = ready_session();
        assert_eq!(session.handle_frame("createInstance").unwrap(), vec![
            SessionAction::PrepareInstance
        ]);

        let actions = session.complete_instance_preparation(Ok(flavors()), Ok(networks())).unwrap();
        assert_eq!(sent(&actions), vec!["1 : m1.tiny\n2 : m1.small", "net-a : private"]);
    }

    #[test]
    fn create_instance_without_flavors_reports_only_flavors() {
        let mut session = ready_session();
        session.handle_frame("createInstance").unwrap();

        let actions = session.complete_instance_preparation(Ok(vec![]), Ok(networks())).unwrap();
        assert_eq!(sent(&actions), vec![messages::NO_FLAVORS]);
    }

    #[test]
    fn create_instance_without_networks_reports_only_networks() {
        let mut session = ready_session();
        session.handle_frame("createInstance").unwrap();

        let actions = session.complete_instance_preparation(Ok(flavors()), Ok(vec![])).unwrap();
        assert_eq!(sent(&actions), vec![messages::NO_NETWORKS]);
    }

    #[test]
    fn create_instance_with_nothing_reports_both() {
        let mut session = ready_session();
        session.handle_frame("createInstance").unwrap();

        let actions = session.complete_instance_preparation(Ok(vec![]), Ok(vec![])).unwrap();
        assert_eq!(sent(&actions), vec![messages::NO_FLAVORS, messages::NO_NETWORKS]);
    }

    #[test]
    fn create_instance_failures_are_reported_per_list() {
        let mut session = ready_session();
        session.handle_frame("createInstance").unwrap();

        let actions = session
            .complete_instance_preparation(
                Err(FacadeError::Unreachable("nova down".to_string())),
                Ok(vec![]),
            )
            .unwrap();
        assert_eq!(sent(&actions), vec![messages::FLAVOR_LISTING_FAILED, messages::NO_NETWORKS]);

        session.handle_frame("createInstance").unwrap();
        let actions = session
            .complete_instance_preparation(
                Ok(flavors()),
                Err(FacadeError::Backend("neutron 500".to_string())),
            )
            .unwrap();
        assert_eq!(sent(&actions), vec![messages::NETWORK_LISTING_FAILED]);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn unrecognized_command_sends_nothing() {
        let mut session = ready_session();

        let actions = session.handle_frame("rm -rf /").unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(session.pending(), None);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn completion_without_pending_call_is_rejected() {
        let mut session = ready_session();

        let result = session.complete_image_listing(Ok(vec![]));
        assert_eq!(
            result,
            Err(SessionError::UnexpectedCompletion {
                expected: None,
                actual: PendingCall::ImageListing
            })
        );

        session.handle_frame("lsimage").unwrap();
        let result = session.complete_instance_preparation(Ok(vec![]), Ok(vec![]));
        assert!(matches!(result, Err(SessionError::UnexpectedCompletion { .. })));
    }

    #[test]
    fn close_clears_pending_call() {
        let mut session = ready_session();
        session.handle_frame("lsimage").unwrap();

        session.close();
        assert_eq!(session.pending(), None);
        assert!(session.handles().is_none());
    }
}
