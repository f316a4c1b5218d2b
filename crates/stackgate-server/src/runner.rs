//! Session runner.
//!
//! Executes [`SessionAction`]s produced by the core [`Session`] against real
//! I/O: a [`Channel`] for frames, the [`ResourceFacade`] for backend calls
//! and an [`AuditSink`] for the audit trail. One runner serves one
//! connection, strictly sequentially: a frame is fully processed, facade
//! calls included, before the next one is read.

use std::{collections::VecDeque, sync::Arc};

use stackgate_core::{
    AuditEvent, Authenticator, LogLevel, ResourceFacade, Session, SessionAction,
};

use crate::{
    audit::AuditSink,
    channel::{Channel, ChannelError},
    error::ServerError,
};

/// Drives one session over one channel.
pub struct SessionRunner<F: ResourceFacade, C: Channel> {
    session: Session<F>,
    channel: C,
    facade: Arc<F>,
    authenticator: Authenticator<F>,
    audit: Arc<dyn AuditSink>,
}

impl<F: ResourceFacade, C: Channel> SessionRunner<F, C> {
    /// Create a runner for a freshly accepted channel.
    pub fn new(channel: C, facade: Arc<F>, audit: Arc<dyn AuditSink>, auth_url: &str) -> Self {
        let session = Session::new(channel.remote_addr(), auth_url);
        let authenticator = Authenticator::new(Arc::clone(&facade));

        Self { session, channel, facade, authenticator, audit }
    }

    /// Run the session to completion.
    ///
    /// Returns once the peer disconnects, authentication fails, or the
    /// channel breaks. The disconnect is audited and the channel closed in
    /// every case.
    ///
    /// # Errors
    ///
    /// - `ServerError::Session` if the state machine was driven out of order
    /// - `ServerError::Internal` if a command arrived without resource handles
    pub async fn run(mut self) -> Result<(), ServerError> {
        let result = self.drive().await;

        let actions = self.session.close();
        self.execute_terminal(actions);
        self.channel.close().await;

        result
    }

    async fn drive(&mut self) -> Result<(), ServerError> {
        let actions = self.session.start()?;
        self.execute(actions).await?;

        while !self.session.is_closed() {
            let text = match self.channel.receive().await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    tracing::debug!("peer closed the channel");
                    break;
                },
                Err(ChannelError::Protocol(e)) => {
                    tracing::warn!("dropping session after malformed frame: {}", e);
                    break;
                },
                Err(e) => {
                    tracing::debug!("receive failed: {}", e);
                    break;
                },
            };

            let actions = self.session.handle_frame(&text)?;
            self.execute(actions).await?;
        }

        Ok(())
    }

    /// Execute actions in order. Completions feed their follow-up actions
    /// back into the same queue.
    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), ServerError> {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Send(text) => match self.channel.send(&text).await {
                    Ok(()) => {},
                    // Nothing reached the wire; the stream is still usable
                    Err(ChannelError::Protocol(e)) => {
                        tracing::error!("dropping frame that cannot be encoded: {}", e);
                    },
                    Err(e) => {
                        tracing::debug!("send failed: {}", e);
                        let actions = self.session.close();
                        self.execute_terminal(actions);
                        return Ok(());
                    },
                },

                SessionAction::Authenticate(credentials) => {
                    let outcome = self.authenticator.authenticate(&credentials).await;
                    drop(credentials);
                    queue.extend(self.session.complete_authentication(outcome)?);
                },

                SessionAction::ListImages => {
                    let handles = self.session.handles().ok_or_else(missing_handles)?;
                    let result = self.facade.list_images(&handles.image).await;
                    queue.extend(self.session.complete_image_listing(result)?);
                },

                SessionAction::PrepareInstance => {
                    let handles = self.session.handles().ok_or_else(missing_handles)?;
                    let (flavors, networks) = tokio::join!(
                        self.facade.list_flavors(&handles.compute),
                        self.facade.list_networks(&handles.network),
                    );
                    queue.extend(self.session.complete_instance_preparation(flavors, networks)?);
                },

                SessionAction::Audit(event) => self.record(&event),

                SessionAction::Log { level, message } => log(level, &message),

                SessionAction::Close { reason } => {
                    tracing::info!("closing session: {}", reason);
                    self.channel.close().await;
                },
            }
        }

        Ok(())
    }

    /// Actions emitted by [`Session::close`] carry no I/O besides auditing.
    fn execute_terminal(&self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Audit(event) => self.record(&event),
                SessionAction::Log { level, message } => log(level, &message),
                other => tracing::warn!("ignoring {:?} after close", other),
            }
        }
    }

    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            tracing::error!("failed to record audit event '{}': {}", event, e);
        }
    }
}

fn missing_handles() -> ServerError {
    ServerError::Internal("command dispatched without resource handles".to_string())
}

fn log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
    }
}
