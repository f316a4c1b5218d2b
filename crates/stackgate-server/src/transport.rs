//! Quinn-based QUIC transport implementation.
//!
//! Production QUIC transport using the Quinn library. Provides encrypted
//! streams over UDP with TLS 1.3. Supports both production TLS certificates
//! (via PEM files) and self-signed certificates for testing.
//!
//! Each accepted connection carries exactly one session. The server opens a
//! single bidirectional stream right after the handshake and every frame of
//! the session travels on it, so frames stay ordered in both directions.
//!
//! # Security
//!
//! The transport enforces TLS 1.3 via the `rustls` crate with the `ring`
//! provider. ALPN is set to "stackgate" to ensure protocol compatibility.
//! Self-signed certificates are only suitable for local testing - production
//! deployments MUST use proper TLS certificates from a trusted CA, since
//! clients send identity-service passwords over this channel.

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use bytes::BytesMut;
use quinn::{Endpoint, ReadExactError, RecvStream, SendStream, ServerConfig};
use stackgate_proto::{ALPN_PROTOCOL, Frame, FrameHeader};

use crate::{
    channel::{Channel, ChannelError},
    error::ServerError,
};

/// How long a closing channel waits for the client to acknowledge the final
/// frames and hang up before the connection is closed from this side.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// QUIC transport using Quinn.
///
/// Provides a QUIC endpoint that can accept incoming connections. The endpoint
/// is configured with TLS 1.3 and ALPN protocol "stackgate".
pub struct QuinnTransport {
    /// Quinn endpoint
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// If `cert_path` and `key_path` are provided, they will be used for TLS.
    /// Otherwise, a self-signed certificate will be generated for testing.
    pub fn bind(
        address: &str,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let server_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => load_tls_config(cert, key)?,
            (None, None) => generate_self_signed_config()?,
            _ => {
                return Err(ServerError::Config(
                    "certificate and key must be provided together".to_string(),
                ));
            },
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!("QUIC transport bound to {}", addr);

        Ok(Self { endpoint })
    }

    /// Wait for the next connection attempt.
    ///
    /// Returns as soon as a client starts a handshake, without waiting for
    /// it to finish; see [`QuinnIncoming::establish`]. Returns `None` once
    /// the endpoint has been closed.
    pub async fn accept(&self) -> Option<QuinnIncoming> {
        self.endpoint.accept().await.map(|incoming| QuinnIncoming { incoming })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Stop accepting connections and close existing ones.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"server shutting down");
    }
}

/// A connection attempt whose handshake is still in flight.
pub struct QuinnIncoming {
    incoming: quinn::Incoming,
}

impl QuinnIncoming {
    /// Address the attempt came from.
    pub fn remote_addr(&self) -> SocketAddr {
        self.incoming.remote_address()
    }

    /// Complete the QUIC and TLS handshake.
    ///
    /// Bounded by the endpoint's idle timeout. A client that stalls here
    /// only holds up its own task.
    pub async fn establish(self) -> Result<QuinnConnection, ServerError> {
        let connection = self
            .incoming
            .await
            .map_err(|e| ServerError::Transport(format!("handshake failed: {e}")))?;

        Ok(QuinnConnection { connection })
    }
}

/// A QUIC connection wrapper.
///
/// Clones are cheap and share the same underlying QUIC connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Open the session stream. The client sees it once the first frame is
    /// written.
    pub async fn open_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection
            .open_bi()
            .await
            .map_err(|e| ServerError::Transport(format!("open_bi failed: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with an error code and reason.
    pub fn close(&self, error_code: quinn::VarInt, reason: &[u8]) {
        self.connection.close(error_code, reason);
    }
}

/// [`Channel`] over one QUIC bidirectional stream.
pub struct QuinnChannel {
    connection: QuinnConnection,
    send: SendStream,
    recv: RecvStream,
    buf: BytesMut,
    closed: bool,
}

impl QuinnChannel {
    /// Open the session stream on an accepted connection.
    pub async fn open(connection: QuinnConnection) -> Result<Self, ServerError> {
        let (send, recv) = connection.open_bi().await?;

        Ok(Self { connection, send, recv, buf: BytesMut::with_capacity(4096), closed: false })
    }
}

impl Channel for QuinnChannel {
    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        self.buf.clear();
        Frame::from_text(text).encode(&mut self.buf)?;

        self.send
            .write_all(&self.buf)
            .await
            .map_err(|e| ChannelError::Transport(format!("write failed: {e}")))
    }

    async fn receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        self.buf.clear();
        self.buf.resize(FrameHeader::SIZE, 0);

        match self.recv.read_exact(&mut self.buf[..FrameHeader::SIZE]).await {
            Ok(()) => {},
            Err(ReadExactError::FinishedEarly(0)) => return Ok(None),
            Err(ReadExactError::FinishedEarly(read)) => {
                return Err(ChannelError::Transport(format!(
                    "stream finished inside a frame header after {read} bytes"
                )));
            },
            Err(ReadExactError::ReadError(e)) => {
                return Err(ChannelError::Transport(format!("header read failed: {e}")));
            },
        }

        let payload_size = FrameHeader::from_bytes(&self.buf[..FrameHeader::SIZE])?.payload_size()
            as usize;

        if payload_size > 0 {
            self.buf.resize(FrameHeader::SIZE + payload_size, 0);
            self.recv
                .read_exact(&mut self.buf[FrameHeader::SIZE..])
                .await
                .map_err(|e| ChannelError::Transport(format!("payload read failed: {e}")))?;
        }

        let text = Frame::decode(&self.buf)?.into_text()?;
        Ok(Some(text))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Finishing fails only if the stream is already gone.
        if self.send.finish().is_ok() {
            let _ = tokio::time::timeout(CLOSE_GRACE, self.send.stopped()).await;
        }
        let _ = tokio::time::timeout(CLOSE_GRACE, self.connection.connection.closed()).await;

        self.connection.close(0u32.into(), b"session closed");
    }

    fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_addr()
    }
}

/// Load TLS configuration from certificate and key files.
fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, ServerError> {
    use std::fs;

    let cert_pem = fs::read(cert_path).map_err(|e| {
        ServerError::Config(format!("failed to read cert '{}': {e}", cert_path.display()))
    })?;

    let key_pem = fs::read(key_path).map_err(|e| {
        ServerError::Config(format!("failed to read key '{}': {e}", key_path.display()))
    })?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config("no private key found".to_string()))?;

    let tls_config = tls_builder()?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    quic_server_config(tls_config)
}

/// Generate a self-signed certificate for testing.
fn generate_self_signed_config() -> Result<ServerConfig, ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_der = cert.cert.der().clone();
    let key_der = cert.key_pair.serialize_der();

    let cert_chain = vec![cert_der];
    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(key_der);

    let tls_config = tls_builder()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key.into())
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tracing::warn!("Using self-signed certificate - not for production use!");

    quic_server_config(tls_config)
}

/// TLS 1.3 builder pinned to the `ring` provider.
fn tls_builder()
-> Result<rustls::ConfigBuilder<rustls::ServerConfig, rustls::WantsVerifier>, ServerError> {
    rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| ServerError::Config(format!("invalid TLS protocol versions: {e}")))
}

fn quic_server_config(mut tls_config: rustls::ServerConfig) -> Result<ServerConfig, ServerError> {
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?,
    )))
}
