//! Stackgate wire protocol.
//!
//! Everything that crosses the wire between a gateway client and the gateway
//! server lives here:
//!
//! - [`FrameHeader`] and [`Frame`]: the length-delimited framing that carries
//!   one text message per frame over a QUIC stream
//! - [`messages`]: the exact literal strings of the handshake and the command
//!   responses
//! - [`Command`]: the post-handshake command verbs
//!
//! The crate is pure data and parsing. It performs no I/O.

#![warn(missing_docs)]

mod command;
pub mod errors;
mod frame;
mod header;
pub mod messages;

pub use command::Command;
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;

/// ALPN protocol identifier negotiated during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"stackgate";
