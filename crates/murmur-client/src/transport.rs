//! QUIC transport for upstream sessions.
//!
//! One client endpoint is shared by every session; each session gets its own
//! QUIC connection and a single bidirectional stream on it.

use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use murmur_proto::ALPN_PROTOCOL;
use quinn::{ClientConfig, Endpoint};

use crate::{TransportError, UpstreamConnector, UpstreamSession};

/// QUIC client settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Give up on a QUIC handshake after this long
    pub connect_timeout: Duration,
    /// Close a connection after this long without traffic
    pub idle_timeout: Duration,
    /// TLS server name sent in the handshake
    pub server_name: String,
}

impl TransportConfig {
    /// Settings for local development against a self-signed server.
    ///
    /// The connector built from this config accepts any server certificate.
    #[must_use]
    pub fn development() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(120),
            server_name: "localhost".to_string(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// [`UpstreamConnector`] that reaches the broadcast server over QUIC.
pub struct QuicConnector {
    endpoint: Endpoint,
    server_addr: SocketAddr,
    config: TransportConfig,
}

impl QuicConnector {
    /// Create a connector for `server_addr` (e.g. `"127.0.0.1:50051"`).
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `TransportError::Connection` if the address does not resolve or the
    ///   local endpoint cannot be created
    pub fn new(server_addr: &str, config: TransportConfig) -> Result<Self, TransportError> {
        let server = server_addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connection(format!("invalid address '{server_addr}': {e}")))?
            .next()
            .ok_or_else(|| {
                TransportError::Connection(format!("address '{server_addr}' did not resolve"))
            })?;

        let local = if server.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let mut endpoint = Endpoint::client(local)
            .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
        endpoint.set_default_client_config(insecure_client_config(&config)?);

        Ok(Self { endpoint, server_addr: server, config })
    }

    /// Server address sessions connect to.
    #[must_use]
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

#[async_trait]
impl UpstreamConnector for QuicConnector {
    async fn connect(&self, username: &str) -> Result<UpstreamSession, TransportError> {
        let connecting = self
            .endpoint
            .connect(self.server_addr, &self.config.server_name)
            .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;

        let connection = tokio::time::timeout(self.config.connect_timeout, connecting)
            .await
            .map_err(|_| {
                TransportError::Connection(format!(
                    "timed out after {:?} connecting to {}",
                    self.config.connect_timeout, self.server_addr
                ))
            })?
            .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

        let (send, recv) = connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("open_bi failed: {e}")))?;

        tracing::debug!(user = %username, server = %self.server_addr, "upstream stream opened");

        UpstreamSession::establish(recv, send, username).await
    }
}

/// Client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates.
fn insecure_client_config(config: &TransportConfig) -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();

    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("QUIC config error: {e}")))?;
    let mut client_config = ClientConfig::new(Arc::new(quic_crypto));

    let idle = quinn::IdleTimeout::try_from(config.idle_timeout)
        .map_err(|e| TransportError::Connection(format!("invalid idle timeout: {e}")))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    client_config.transport_config(Arc::new(transport));

    Ok(client_config)
}

/// Certificate verifier that accepts any certificate.
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
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
        ]
    }
}
