//! Quinn-based QUIC transport.
//!
//! Each QUIC connection may carry any number of bidirectional streams; every
//! stream is an independent chat session. TLS 1.3 with ALPN `"murmur"`.
//! Without certificate paths the transport generates a self-signed
//! certificate, which is only suitable for local development.

use std::{net::SocketAddr, sync::Arc};

use murmur_proto::ALPN_PROTOCOL;
use quinn::{Endpoint, RecvStream, SendStream, ServerConfig};

use crate::ServerError;

/// QUIC endpoint accepting chat connections.
pub struct QuinnTransport {
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Bind a QUIC endpoint on `address`.
    ///
    /// Uses the PEM certificate and key when both paths are given, otherwise
    /// a generated self-signed certificate. Must be called inside a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` for a bad address or unusable TLS material
    /// - `ServerError::Transport` if the socket cannot be bound
    pub fn bind(
        address: &str,
        cert_path: Option<&str>,
        key_path: Option<&str>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let server_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => load_tls_config(cert, key)?,
            _ => generate_self_signed_config()?,
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!("QUIC transport bound to {}", addr);

        Ok(Self { endpoint })
    }

    /// Wait for the next incoming connection.
    ///
    /// # Errors
    ///
    /// - `ServerError::TransportClosed` once the endpoint is closed
    /// - `ServerError::Transport` if a single connection handshake fails
    pub async fn accept(&self) -> Result<QuinnConnection, ServerError> {
        let incoming = self.endpoint.accept().await.ok_or(ServerError::TransportClosed)?;

        let connection = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("connection failed: {e}")))?;

        Ok(QuinnConnection { connection })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Close every connection and stop accepting new ones.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"server shutdown");
    }
}

/// One accepted QUIC connection. Clones share the connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Wait for the peer to open a bidirectional stream.
    ///
    /// # Errors
    ///
    /// - `ServerError::TransportClosed` once the connection is gone
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection.accept_bi().await.map_err(|e| {
            tracing::debug!(remote = %self.remote_addr(), reason = %e, "connection closed");
            ServerError::TransportClosed
        })
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }
}

/// Load TLS configuration from PEM certificate and key files.
fn load_tls_config(cert_path: &str, key_path: &str) -> Result<ServerConfig, ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(ServerError::Config(format!("no certificates found in '{cert_path}'")));
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config(format!("no private key found in '{key_path}'")))?;

    quic_config(certs, key)
}

/// Generate a self-signed certificate for `localhost`.
fn generate_self_signed_config() -> Result<ServerConfig, ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    tracing::warn!("Using self-signed certificate - not for production use!");

    quic_config(vec![cert.cert.der().clone()], key.into())
}

fn quic_config(
    certs: Vec<rustls::pki_types::CertificateDer<'static>>,
    key: rustls::pki_types::PrivateKeyDer<'static>,
) -> Result<ServerConfig, ServerError> {
    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}
