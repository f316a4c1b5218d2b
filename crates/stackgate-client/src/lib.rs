//! Client
//!
//! QUIC client transport for the stackgate session gateway. Connects to a
//! gateway, picks up the session stream the server opens, and exchanges text
//! frames on it.
//!
//! The gateway protocol is a short linear handshake followed by one command
//! per turn, so the client is a plain request/response handle rather than a
//! state machine:
//!
//! ```ignore
//! let mut conn = stackgate_client::connect(addr).await?;
//! let prompt = conn.recv().await?;
//! conn.send("alice,s3cret,demo").await?;
//! ```
//!
//! # Components
//!
//! - [`connect`] / [`connect_with_config`]: open a connection
//! - [`GatewayConnection`]: send and receive text frames
//! - [`TransportConfig`]: timeouts and TLS server name

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod transport;

pub use transport::{
    GatewayConnection, TransportConfig, TransportError, connect, connect_with_config,
};
