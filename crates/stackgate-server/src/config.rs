//! Gateway configuration.
//!
//! Built once at startup and passed by value to [`crate::Server::bind`].

use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::ServerError;

/// Identity-service API version used to authenticate credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityVersion {
    /// Keystone v2.0 (`/v2.0/tokens`)
    V2,
    /// Keystone v3 (`/v3/auth/tokens`)
    #[default]
    V3,
}

impl FromStr for IdentityVersion {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "2" | "2.0" => Ok(Self::V2),
            "3" | "3.0" => Ok(Self::V3),
            _ => Err(ServerError::Config(format!("unsupported identity API version '{s}'"))),
        }
    }
}

impl fmt::Display for IdentityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("2.0"),
            Self::V3 => f.write_str("3"),
        }
    }
}

/// Identity-service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Base URL of the identity service, without the version suffix
    pub auth_url: String,
    /// API version to speak
    pub api_version: IdentityVersion,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { auth_url: "http://localhost/identity".to_string(), api_version: IdentityVersion::V3 }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Address to bind to (e.g., "0.0.0.0:8090")
    pub bind_address: String,
    /// Identity service used to authenticate sessions
    pub identity: IdentityConfig,
    /// Append-only audit log file
    pub audit_log: PathBuf,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<PathBuf>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            identity: IdentityConfig::default(),
            audit_log: PathBuf::from("server.log"),
            cert_path: None,
            key_path: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identity_version_accepts_common_spellings() {
        for raw in ["2", "2.0", "v2.0", "V2"] {
            assert_eq!(raw.parse::<IdentityVersion>().unwrap(), IdentityVersion::V2, "{raw}");
        }
        for raw in ["3", "3.0", "v3"] {
            assert_eq!(raw.parse::<IdentityVersion>().unwrap(), IdentityVersion::V3, "{raw}");
        }
    }

    #[test]
    fn identity_version_rejects_unknown() {
        assert!(matches!("4".parse::<IdentityVersion>(), Err(ServerError::Config(_))));
        assert!(matches!("".parse::<IdentityVersion>(), Err(ServerError::Config(_))));
    }

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8090");
        assert_eq!(config.identity.api_version, IdentityVersion::V3);
        assert_eq!(config.identity.auth_url, "http://localhost/identity");
        assert_eq!(config.audit_log, PathBuf::from("server.log"));
        assert!(config.cert_path.is_none());
    }
}
