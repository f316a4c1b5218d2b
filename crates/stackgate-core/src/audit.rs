//! Audit trail events.
//!
//! The session reports four points in a connection's life. Rendering follows
//! the audit log format `<message>`; the sink prepends the timestamp.

use std::{fmt, net::SocketAddr};

/// Connection and login events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// A client connected
    ConnectionAccepted {
        /// Client address
        peer: SocketAddr,
    },
    /// The client's credentials were accepted
    LoginSucceeded {
        /// Client address
        peer: SocketAddr,
    },
    /// The client's credentials were rejected
    LoginFailed {
        /// Client address
        peer: SocketAddr,
    },
    /// The session ended
    Disconnected {
        /// Client address
        peer: SocketAddr,
    },
}

impl AuditEvent {
    /// Address of the client the event concerns.
    pub fn peer(&self) -> SocketAddr {
        match self {
            Self::ConnectionAccepted { peer }
            | Self::LoginSucceeded { peer }
            | Self::LoginFailed { peer }
            | Self::Disconnected { peer } => *peer,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `<ip>:<port>` without IPv6 brackets.
        let peer = self.peer();
        let (ip, port) = (peer.ip(), peer.port());
        match self {
            Self::ConnectionAccepted { .. } => write!(f, "CONNECTION FROM {ip}:{port}"),
            Self::LoginSucceeded { .. } => write!(f, "LOGIN SUCCESS FOR {ip}:{port}"),
            Self::LoginFailed { .. } => write!(f, "LOGIN FAILED FOR {ip}:{port}"),
            Self::Disconnected { .. } => write!(f, "DISCONNECTED {ip}:{port}"),
        }
    }
}
