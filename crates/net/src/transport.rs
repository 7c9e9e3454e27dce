//! QUIC endpoints carrying the `computercraft:main` channel.
//!
//! Uses self-signed TLS certificates; the channel is not authenticated.

use crate::link::LinkConfig;
use anyhow::{Context, Result};
use quinn::{ClientConfig, Endpoint, ServerConfig, TransportConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// ALPN protocol id, the channel name.
pub const ALPN: &[u8] = b"computercraft:main";

/// Listening side of the channel.
pub struct ServerEndpoint {
    endpoint: Endpoint,
    addr: SocketAddr,
}

impl ServerEndpoint {
    /// Bind to `addr` with a freshly generated identity.
    pub fn bind(addr: SocketAddr, link: &LinkConfig) -> Result<Self> {
        info!("Creating server endpoint on {}", addr);

        let (cert, key) = server_identity()?;
        let mut server_crypto = rustls::ServerConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .context("TLS provider lacks default protocol versions")?
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)
            .context("Failed to build rustls ServerConfig")?;
        server_crypto.alpn_protocols = vec![ALPN.to_vec()];

        let mut server_config = ServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(server_crypto)
                .context("Failed to create QuicServerConfig")?,
        ));
        server_config.transport_config(Arc::new(transport_config(link)?));

        let endpoint =
            Endpoint::server(server_config, addr).context("Failed to bind server endpoint")?;

        let actual_addr = endpoint.local_addr()?;
        info!("Server endpoint bound to {}", actual_addr);

        Ok(Self {
            endpoint,
            addr: actual_addr,
        })
    }

    /// Bound address, with the real port when `addr` asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Next connection attempt; `None` once the endpoint is closed.
    pub async fn accept(&self) -> Option<quinn::Incoming> {
        self.endpoint.accept().await
    }

    /// Close the endpoint, rejecting new connections.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Server shutting down");
    }
}

/// Dialing side of the channel.
pub struct ClientEndpoint {
    endpoint: Endpoint,
}

impl ClientEndpoint {
    /// Bind an ephemeral local port. Any server certificate is trusted, but
    /// the handshake must still be signed by it.
    pub fn new(link: &LinkConfig) -> Result<Self> {
        debug!("Creating client endpoint");

        let provider = crypto_provider();
        let mut client_crypto = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .context("TLS provider lacks default protocol versions")?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TrustServerIdentity { provider }))
            .with_no_client_auth();
        client_crypto.alpn_protocols = vec![ALPN.to_vec()];

        let mut client_config = ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(client_crypto)
                .context("Failed to create QuicClientConfig")?,
        ));
        client_config.transport_config(Arc::new(transport_config(link)?));

        let mut endpoint = Endpoint::client("0.0.0.0:0".parse()?)?;
        endpoint.set_default_client_config(client_config);

        debug!("Client endpoint created on {}", endpoint.local_addr()?);

        Ok(Self { endpoint })
    }

    /// Dial `server_addr` and finish the QUIC handshake.
    pub async fn connect(&self, server_addr: SocketAddr) -> Result<quinn::Connection> {
        info!("Connecting to server at {}", server_addr);

        let connection = self
            .endpoint
            .connect(server_addr, SERVER_NAME)
            .context("Failed to initiate connection")?
            .await
            .context("Failed to establish connection")?;

        info!("Connected to server at {}", server_addr);

        Ok(connection)
    }

    /// Close the endpoint, terminating all connections.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"Client shutting down");
    }

    /// Wait until every connection of this endpoint has shut down cleanly.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

fn transport_config(link: &LinkConfig) -> Result<TransportConfig> {
    let mut transport = TransportConfig::default();
    transport.keep_alive_interval(Some(Duration::from_secs(link.keep_alive_secs)));
    transport.max_idle_timeout(Some(
        Duration::from_secs(link.idle_timeout_secs)
            .try_into()
            .context("Idle timeout out of range")?,
    ));
    Ok(transport)
}

/// Name every server certificate is issued for and every client dials.
const SERVER_NAME: &str = "localhost";

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// A fresh certificate and key per server endpoint.
fn server_identity() -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
    let certified = rcgen::generate_simple_self_signed(vec![SERVER_NAME.to_string()])
        .context("Failed to generate server certificate")?;
    debug!("Generated server certificate for {}", SERVER_NAME);

    let key = PrivateKeyDer::Pkcs8(certified.key_pair.serialize_der().into());
    Ok((CertificateDer::from(certified.cert), key))
}

/// Trusts whatever certificate the server presents.
///
/// Handshake signatures are still checked against that certificate; only
/// the chain of trust is skipped, since every server identity is generated
/// at startup.
#[derive(Debug)]
struct TrustServerIdentity {
    provider: Arc<rustls::crypto::CryptoProvider>,
}

impl rustls::client::danger::ServerCertVerifier for TrustServerIdentity {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
