//! Fuzz target for the session state machine
//!
//! Drives a `Session` with arbitrary interleavings of client frames, facade
//! completions and closes, including completions nobody asked for.
//!
//! # Invariants
//!
//! - Handles are held if and only if the session is Ready
//! - Backend listings are only requested from a Ready session
//! - A rejected event leaves state and pending call untouched
//! - The disconnect is audited at most once
//! - Nothing panics

#![no_main]

use std::net::SocketAddr;

use arbitrary::Arbitrary;
use async_trait::async_trait;
use libfuzzer_sys::fuzz_target;
use stackgate_core::{
    AuditEvent, AuthOutcome, Credentials, DenialReason, FacadeError, InstanceRequest,
    ResourceFacade, ResourceHandles, ResourceRecord, Session, SessionAction, SessionState,
};

struct NoBackend;

#[async_trait]
impl ResourceFacade for NoBackend {
    type Compute = ();
    type Image = ();
    type Network = ();

    async fn authenticate(&self, _: &Credentials) -> Result<ResourceHandles<Self>, FacadeError> {
        Err(FacadeError::MissingToken)
    }

    async fn list_images(&self, _: &()) -> Result<Vec<ResourceRecord>, FacadeError> {
        Ok(Vec::new())
    }

    async fn list_flavors(&self, _: &()) -> Result<Vec<ResourceRecord>, FacadeError> {
        Ok(Vec::new())
    }

    async fn list_networks(&self, _: &()) -> Result<Vec<ResourceRecord>, FacadeError> {
        Ok(Vec::new())
    }

    async fn create_instance(
        &self,
        _: &(),
        _: &InstanceRequest,
    ) -> Result<ResourceRecord, FacadeError> {
        Err(FacadeError::Backend("unsupported".to_string()))
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Start,
    Frame(FrameText),
    Authenticated { granted: bool },
    ImagesListed(Listing),
    InstancePrepared { flavors: Listing, networks: Listing },
    Close,
}

#[derive(Debug, Clone, Arbitrary)]
enum FrameText {
    ListImages,
    CreateInstance,
    Credentials { user: String, password: String, project: String },
    Raw(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum Listing {
    Empty,
    Records(Vec<(String, String)>),
    Failed,
}

impl FrameText {
    fn render(&self) -> String {
        match self {
            Self::ListImages => "lsimage".to_string(),
            Self::CreateInstance => "createInstance".to_string(),
            Self::Credentials { user, password, project } => {
                format!("{user},{password},{project}")
            },
            Self::Raw(text) => text.clone(),
        }
    }
}

impl Listing {
    fn result(&self) -> Result<Vec<ResourceRecord>, FacadeError> {
        match self {
            Self::Empty => Ok(Vec::new()),
            Self::Records(records) => {
                Ok(records.iter().map(|(id, name)| ResourceRecord::new(id, name)).collect())
            },
            Self::Failed => Err(FacadeError::Unreachable("fuzz".to_string())),
        }
    }
}

fuzz_target!(|ops: Vec<SessionOp>| {
    let peer: SocketAddr = SocketAddr::from(([192, 0, 2, 1], 4000));
    let mut session: Session<NoBackend> = Session::new(peer, "http://keystone.fuzz");
    let mut disconnects = 0usize;

    for op in ops {
        let before_state = session.state();
        let before_pending = session.pending();

        let result = match op {
            SessionOp::Start => session.start(),
            SessionOp::Frame(frame) => session.handle_frame(&frame.render()),
            SessionOp::Authenticated { granted } => {
                let outcome = if granted {
                    AuthOutcome::Granted(ResourceHandles::new((), (), ()))
                } else {
                    AuthOutcome::Denied(DenialReason::Facade(FacadeError::MissingToken))
                };
                session.complete_authentication(outcome)
            },
            SessionOp::ImagesListed(listing) => session.complete_image_listing(listing.result()),
            SessionOp::InstancePrepared { flavors, networks } => {
                session.complete_instance_preparation(flavors.result(), networks.result())
            },
            SessionOp::Close => Ok(session.close()),
        };

        match result {
            Ok(actions) => {
                for action in &actions {
                    match action {
                        SessionAction::ListImages | SessionAction::PrepareInstance => {
                            assert_eq!(before_state, SessionState::Ready);
                        },
                        SessionAction::Audit(AuditEvent::Disconnected { peer: p }) => {
                            assert_eq!(*p, peer);
                            disconnects += 1;
                        },
                        _ => {},
                    }
                }
            },
            Err(_) => {
                assert_eq!(session.state(), before_state);
                assert_eq!(session.pending(), before_pending);
            },
        }

        assert_eq!(session.handles().is_some(), session.state() == SessionState::Ready);
        assert!(disconnects <= 1);
    }
});
