//! Stackgate gateway server.
//!
//! Production server implementation using Quinn for QUIC transport and Tokio
//! for the async runtime.
//!
//! # Architecture
//!
//! This crate provides the "glue" that wraps [`stackgate_core`]'s
//! action-based session logic with real I/O. The core [`Session`] follows the
//! Sans-IO pattern, while [`SessionRunner`] executes its actions against a
//! [`Channel`], a [`ResourceFacade`] and an [`AuditSink`].
//!
//! # Components
//!
//! - [`Server`]: accepts connections and spawns one runner task per session
//! - [`SessionRunner`]: executes session actions for one connection
//! - [`QuinnTransport`]: QUIC transport via Quinn library
//! - [`OpenStackFacade`]: facade speaking the OpenStack REST APIs
//! - [`StaticFacade`]: in-memory facade for tests
//! - [`FileAuditLog`]: append-only audit trail
//!
//! [`Session`]: stackgate_core::Session

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod channel;
mod config;
mod error;
pub mod facade;
pub mod openstack;
mod runner;
mod transport;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use audit::{AuditError, AuditSink, FileAuditLog, MemoryAuditLog};
pub use channel::{Channel, ChannelError, MemoryChannel, MemoryPeer};
pub use config::{GatewayConfig, IdentityConfig, IdentityVersion};
pub use error::ServerError;
pub use facade::{Operation, StaticFacade};
pub use openstack::OpenStackFacade;
pub use runner::SessionRunner;
use stackgate_core::ResourceFacade;
use tracing::Instrument;
pub use transport::{QuinnChannel, QuinnConnection, QuinnIncoming, QuinnTransport};

/// Stackgate gateway server.
///
/// Accepts QUIC connections and runs one independent session per
/// connection. Sessions share only the facade and the audit sink.
pub struct Server<F: ResourceFacade> {
    /// Immutable configuration
    config: GatewayConfig,
    /// QUIC endpoint
    transport: QuinnTransport,
    /// Shared facade
    facade: Arc<F>,
    /// Shared audit trail
    audit: Arc<dyn AuditSink>,
}

impl<F: ResourceFacade> Server<F> {
    /// Create and bind a new server.
    pub fn bind(
        config: GatewayConfig,
        facade: Arc<F>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { config, transport, facade, audit })
    }

    /// Run the server, accepting connections until the endpoint closes.
    ///
    /// There is no cap on concurrent sessions.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let next_session_id = AtomicU64::new(1);

        while let Some(incoming) = self.transport.accept().await {
            let id = next_session_id.fetch_add(1, Ordering::Relaxed);
            let peer = incoming.remote_addr();
            let span = tracing::info_span!("session", id, %peer);

            let facade = Arc::clone(&self.facade);
            let audit = Arc::clone(&self.audit);
            let auth_url = self.config.identity.auth_url.clone();

            tokio::spawn(
                async move {
                    if let Err(e) = handle_connection(incoming, facade, audit, &auth_url).await {
                        tracing::error!("Connection error: {}", e);
                    }
                }
                .instrument(span),
            );
        }

        tracing::info!("Endpoint closed, no longer accepting connections");
        Ok(())
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Finish the handshake, open the session stream and run one session on it.
async fn handle_connection<F: ResourceFacade>(
    incoming: QuinnIncoming,
    facade: Arc<F>,
    audit: Arc<dyn AuditSink>,
    auth_url: &str,
) -> Result<(), ServerError> {
    let conn = incoming.establish().await?;
    tracing::debug!("connection established");

    let channel = QuinnChannel::open(conn).await?;
    SessionRunner::new(channel, facade, audit, auth_url).run().await
}
