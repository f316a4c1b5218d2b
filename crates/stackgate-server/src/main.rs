//! Stackgate server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! stackgate-server --auth-url http://controller/identity
//!
//! # Start with TLS certificate (production)
//! stackgate-server --bind 0.0.0.0:8090 --cert cert.pem --key key.pem \
//!     --auth-url https://keystone.example.com:5000 --identity-api-version 3
//! ```
//!
//! Every flag can also be set through its `STACKGATE_*` environment variable.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use stackgate_server::{
    FileAuditLog, GatewayConfig, IdentityConfig, IdentityVersion, OpenStackFacade, Server,
    ServerError,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Stackgate session gateway
#[derive(Parser, Debug)]
#[command(name = "stackgate-server")]
#[command(about = "Session gateway for OpenStack image, flavor and network queries")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, env = "STACKGATE_BIND", default_value = "0.0.0.0:8090")]
    bind: String,

    /// Identity service base URL
    #[arg(long, env = "STACKGATE_AUTH_URL", default_value = "http://localhost/identity")]
    auth_url: String,

    /// Identity API version (2, 2.0 or 3)
    #[arg(long, env = "STACKGATE_IDENTITY_API_VERSION", default_value = "3")]
    identity_api_version: String,

    /// Audit log file (appended)
    #[arg(long, env = "STACKGATE_AUDIT_LOG", default_value = "server.log")]
    audit_log: PathBuf,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, env = "STACKGATE_CERT")]
    cert: Option<PathBuf>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, env = "STACKGATE_KEY")]
    key: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<GatewayConfig, ServerError> {
        let api_version: IdentityVersion = self.identity_api_version.parse()?;

        Ok(GatewayConfig {
            bind_address: self.bind,
            identity: IdentityConfig { auth_url: self.auth_url, api_version },
            audit_log: self.audit_log,
            cert_path: self.cert,
            key_path: self.key,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Stackgate server starting");

    let config = args.into_config()?;
    tracing::info!("Binding to {}", config.bind_address);
    tracing::info!(
        "Identity service {} (API v{})",
        config.identity.auth_url,
        config.identity.api_version
    );

    if config.cert_path.is_none() || config.key_path.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let audit = FileAuditLog::open(&config.audit_log).map_err(|e| {
        ServerError::Config(format!(
            "cannot open audit log '{}': {e}",
            config.audit_log.display()
        ))
    })?;
    tracing::info!("Audit log at {}", audit.path().display());

    let facade = OpenStackFacade::new(config.identity.api_version);
    let server = Server::bind(config, Arc::new(facade), Arc::new(audit))?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::{CommandFactory, FromArgMatches};

    use super::*;

    /// Parse `argv` with every `STACKGATE_*` fallback disabled, so the
    /// results do not depend on the test environment.
    fn parse(argv: &[&str]) -> Args {
        let command = ["bind", "auth_url", "identity_api_version", "audit_log", "cert", "key"]
            .into_iter()
            .fold(Args::command(), |command, id| {
                command.mut_arg(id, |arg| arg.env(None::<&'static str>))
            });
        let matches = command.try_get_matches_from(argv).unwrap();
        Args::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_lower_into_config() {
        let config = parse(&["stackgate-server"]).into_config().unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8090");
        assert_eq!(config.identity.api_version, IdentityVersion::V3);
        assert_eq!(config.identity.auth_url, "http://localhost/identity");
        assert_eq!(config.cert_path, None);
    }

    #[test]
    fn identity_version_two_is_accepted() {
        let args = parse(&[
            "stackgate-server",
            "--identity-api-version",
            "2.0",
            "--auth-url",
            "http://controller:5000",
        ]);
        let config = args.into_config().unwrap();

        assert_eq!(config.identity.api_version, IdentityVersion::V2);
        assert_eq!(config.identity.auth_url, "http://controller:5000");
    }

    #[test]
    fn unsupported_identity_version_is_config_error() {
        let args = parse(&["stackgate-server", "--identity-api-version", "4"]);
        assert!(matches!(args.into_config(), Err(ServerError::Config(_))));
    }
}
