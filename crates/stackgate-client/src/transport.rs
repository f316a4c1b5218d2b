//! QUIC transport for the client.
//!
//! Provides [`GatewayConnection`] which handles QUIC I/O for frame transport.
//! This is a thin layer that just sends/receives frames; the gateway drives
//! the conversation.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::BytesMut;
use quinn::{ClientConfig, Endpoint, ReadExactError, RecvStream, SendStream};
use stackgate_proto::{ALPN_PROTOCOL, Frame, FrameHeader};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Client transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Name presented for TLS (SNI)
    pub server_name: String,
    /// Upper bound on connection establishment, including waiting for the
    /// server to open the session stream
    pub connect_timeout: Duration,
    /// Idle timeout negotiated with the server
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Connected gateway session.
pub struct GatewayConnection {
    endpoint: Endpoint,
    connection: quinn::Connection,
    send: SendStream,
    recv: RecvStream,
    buf: BytesMut,
}

/// Connect to a stackgate gateway with default settings.
pub async fn connect(server_addr: SocketAddr) -> Result<GatewayConnection, TransportError> {
    connect_with_config(server_addr, &TransportConfig::default()).await
}

/// Connect to a stackgate gateway.
///
/// Completes once the QUIC handshake is done and the server has opened the
/// session stream, which it does by sending the handshake prompt. The prompt
/// stays buffered for the first [`GatewayConnection::recv`].
pub async fn connect_with_config(
    server_addr: SocketAddr,
    config: &TransportConfig,
) -> Result<GatewayConnection, TransportError> {
    let bind: SocketAddr = if server_addr.is_ipv6() {
        SocketAddr::from(([0u16; 8], 0))
    } else {
        SocketAddr::from(([0u8; 4], 0))
    };

    let mut endpoint = Endpoint::client(bind)
        .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
    endpoint.set_default_client_config(insecure_client_config(config)?);

    let establish = async {
        let connection = endpoint
            .connect(server_addr, &config.server_name)
            .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?
            .await
            .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

        let (send, recv) = connection
            .accept_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("accept_bi failed: {e}")))?;

        Ok::<_, TransportError>((connection, send, recv))
    };

    let (connection, send, recv) = tokio::time::timeout(config.connect_timeout, establish)
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))??;

    tracing::debug!("connected to {}", server_addr);

    Ok(GatewayConnection { endpoint, connection, send, recv, buf: BytesMut::with_capacity(4096) })
}

impl GatewayConnection {
    /// Send one text frame.
    pub async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.buf.clear();
        Frame::from_text(text)
            .encode(&mut self.buf)
            .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))?;

        self.send
            .write_all(&self.buf)
            .await
            .map_err(|e| TransportError::Stream(format!("write failed: {e}")))
    }

    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` once the server has finished the session stream.
    pub async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        self.buf.clear();
        self.buf.resize(FrameHeader::SIZE, 0);

        match self.recv.read_exact(&mut self.buf[..FrameHeader::SIZE]).await {
            Ok(()) => {},
            Err(ReadExactError::FinishedEarly(0)) => return Ok(None),
            Err(e) => return Err(TransportError::Stream(format!("header read failed: {e}"))),
        }

        let header = FrameHeader::from_bytes(&self.buf[..FrameHeader::SIZE])
            .map_err(|e| TransportError::Protocol(format!("invalid header: {e}")))?;
        let payload_size = header.payload_size() as usize;

        if payload_size > 0 {
            self.buf.resize(FrameHeader::SIZE + payload_size, 0);
            self.recv
                .read_exact(&mut self.buf[FrameHeader::SIZE..])
                .await
                .map_err(|e| TransportError::Stream(format!("payload read failed: {e}")))?;
        }

        let text = Frame::decode(&self.buf)
            .and_then(Frame::into_text)
            .map_err(|e| TransportError::Protocol(format!("frame decode failed: {e}")))?;

        Ok(Some(text))
    }

    /// Receive the next frame, failing if none arrives within `limit`.
    pub async fn recv_timeout(
        &mut self,
        limit: Duration,
    ) -> Result<Option<String>, TransportError> {
        tokio::time::timeout(limit, self.recv()).await.map_err(|_| TransportError::Timeout(limit))?
    }

    /// Server address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Finish the session stream, close the connection, and wait for the
    /// close to reach the server.
    pub async fn close(mut self) {
        let _ = self.send.finish();
        self.connection.close(0u32.into(), b"client closed");
        self.endpoint.wait_idle().await;
    }
}

/// Create an insecure client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates.
fn insecure_client_config(config: &TransportConfig) -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .map_err(|e| TransportError::Connection(format!("invalid TLS config: {e}")))?
    .dangerous()
    .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
    .with_no_client_auth();

    // Must match server's ALPN protocol
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let mut client_config = ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| TransportError::Connection(format!("QUIC config error: {e}")))?,
    ));

    let idle_timeout = quinn::IdleTimeout::try_from(config.idle_timeout)
        .map_err(|e| TransportError::Connection(format!("invalid idle timeout: {e}")))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle_timeout));
    client_config.transport_config(Arc::new(transport));

    Ok(client_config)
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.server_name, "localhost");
        assert!(config.connect_timeout < config.idle_timeout);
    }

    #[test]
    fn client_config_builds() {
        assert!(insecure_client_config(&TransportConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn connect_to_silent_address_times_out() {
        // Nothing listens here; the QUIC handshake never completes.
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();

        let config =
            TransportConfig { connect_timeout: Duration::from_millis(200), ..Default::default() };
        let result = connect_with_config(addr, &config).await;

        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }
}
