//! Confirms that a host serves a given certificate by performing a TLS
//! handshake against it.
//!
//! The secret's certificate chain is used both as the only trust root and as
//! the client identity, so the handshake succeeds only when the host presents
//! that same certificate for its name. A presented certificate that is
//! byte-for-byte one of the secret's certificates is accepted once the name
//! matches, even when it is a self-signed CA certificate.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use rustls::{
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        verify_server_name, WebPkiServerVerifier,
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    server::ParsedCertificate,
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use std::{io, sync::Arc, time::Duration};
use tokio::{io::AsyncWriteExt, net::TcpStream, time};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Verifier {
    port: u16,
    timeout: Duration,
    provider: Arc<CryptoProvider>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse certificate PEM: {0}")]
    CertificatePem(#[source] io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificate,

    #[error("no certificate could be used as a trust root")]
    NoTrustRoot,

    #[error("failed to parse private key PEM: {0}")]
    KeyPem(#[source] io::Error),

    #[error("no private key found in PEM data")]
    NoKey,

    #[error("invalid client configuration: {0}")]
    Config(#[source] rustls::Error),

    #[error("invalid trust roots: {0}")]
    Roots(#[source] rustls::client::VerifierBuilderError),

    #[error("invalid server name: {0}")]
    ServerName(String),

    #[error("failed to connect to {host}:{port}: {error}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        error: io::Error,
    },

    #[error("handshake with {host}:{port} failed: {error}")]
    Handshake {
        host: String,
        port: u16,
        #[source]
        error: io::Error,
    },

    #[error("{host}:{port} did not respond within {timeout:?}")]
    Timeout {
        host: String,
        port: u16,
        timeout: Duration,
    },
}

// === impl Verifier ===

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, DEFAULT_TIMEOUT)
    }
}

impl Verifier {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            provider: Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        }
    }

    /// Connects to `host` and completes a TLS handshake that trusts only the
    /// given certificate chain. The connection is closed immediately after.
    pub async fn handshake(&self, cert_pem: &[u8], key_pem: &[u8], host: &str) -> Result<(), Error> {
        let config = self.client_config(cert_pem, key_pem)?;
        let server_name = ServerName::try_from(host)
            .map_err(|_| Error::ServerName(host.to_string()))?
            .to_owned();

        let port = self.port;
        let timed_out = || Error::Timeout {
            host: host.to_string(),
            port,
            timeout: self.timeout,
        };

        let tcp = time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| timed_out())?
            .map_err(|error| Error::Connect {
                host: host.to_string(),
                port,
                error,
            })?;
        trace!(%host, port, "Connected");

        let connector = TlsConnector::from(Arc::new(config));
        let mut tls = time::timeout(self.timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| timed_out())?
            .map_err(|error| Error::Handshake {
                host: host.to_string(),
                port,
                error,
            })?;

        if let Ok(Err(error)) = time::timeout(self.timeout, tls.shutdown()).await {
            debug!(%host, %error, "Failed to close connection");
        }
        Ok(())
    }

    fn client_config(&self, cert_pem: &[u8], key_pem: &[u8]) -> Result<ClientConfig, Error> {
        let certs = parse_certs(cert_pem)?;
        let key = parse_key(key_pem)?;

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs.iter().cloned());
        trace!(added, ignored, "Loaded trust roots");
        if added == 0 {
            return Err(Error::NoTrustRoot);
        }

        let chains = WebPkiServerVerifier::builder_with_provider(
            Arc::new(roots),
            self.provider.clone(),
        )
        .build()
        .map_err(Error::Roots)?;
        let verifier = Arc::new(Pinned {
            certs: certs.clone(),
            chains,
        });

        ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(Error::Config)?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_auth_cert(certs, key)
            .map_err(Error::Config)
    }
}

/// Accepts a server certificate that is one of the secret's own certificates,
/// provided it is valid for the requested name. Any other certificate must
/// chain to the secret's certificates.
#[derive(Debug)]
struct Pinned {
    certs: Vec<CertificateDer<'static>>,
    chains: Arc<WebPkiServerVerifier>,
}

// === impl Pinned ===

impl ServerCertVerifier for Pinned {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.certs.iter().any(|c| c.as_ref() == end_entity.as_ref()) {
            verify_server_name(&ParsedCertificate::try_from(end_entity)?, server_name)?;
            trace!("Server presented the pinned certificate");
            return Ok(ServerCertVerified::assertion());
        }
        self.chains
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.chains.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.chains.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.chains.supported_verify_schemes()
    }
}

#[async_trait::async_trait]
impl ingress_auditor_core::Verify for Verifier {
    async fn verify(&self, certificate: &[u8], key: &[u8], host: &str) -> anyhow::Result<()> {
        self.handshake(certificate, key, host).await?;
        Ok(())
    }
}

fn parse_certs(mut pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, Error> {
    let certs = rustls_pemfile::certs(&mut pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::CertificatePem)?;
    if certs.is_empty() {
        return Err(Error::NoCertificate);
    }
    Ok(certs)
}

fn parse_key(mut pem: &[u8]) -> Result<PrivateKeyDer<'static>, Error> {
    rustls_pemfile::private_key(&mut pem)
        .map_err(Error::KeyPem)?
        .ok_or(Error::NoKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingress_auditor_core::Verify;
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    const LOCALHOST_CRT: &[u8] = include_bytes!("testdata/localhost.crt");
    const LOCALHOST_KEY: &[u8] = include_bytes!("testdata/localhost.key");
    const OTHER_CRT: &[u8] = include_bytes!("testdata/other.crt");
    const OTHER_KEY: &[u8] = include_bytes!("testdata/other.key");
    // Generated by `openssl req -x509` with its default extensions, which
    // mark the certificate as a CA.
    const SELF_SIGNED_CRT: &[u8] = include_bytes!("testdata/self-signed.crt");
    const SELF_SIGNED_KEY: &[u8] = include_bytes!("testdata/self-signed.key");

    /// Serves the given identity on an ephemeral loopback port until the test
    /// runtime shuts down.
    async fn serve(cert_pem: &[u8], key_pem: &[u8]) -> u16 {
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .expect("protocol versions must be supported")
        .with_no_client_auth()
        .with_single_cert(
            parse_certs(cert_pem).expect("certificate must parse"),
            parse_key(key_pem).expect("key must parse"),
        )
        .expect("server identity must be valid");
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("must bind");
        let port = listener.local_addr().expect("must have address").port();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    if let Ok(mut tls) = acceptor.accept(tcp).await {
                        let _ = tls.shutdown().await;
                    }
                });
            }
        });
        port
    }

    fn verifier(port: u16) -> Verifier {
        Verifier::new(port, Duration::from_secs(2))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn accepts_host_serving_the_certificate() {
        let port = serve(LOCALHOST_CRT, LOCALHOST_KEY).await;
        verifier(port)
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "localhost")
            .await
            .expect("handshake must succeed");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn accepts_self_signed_ca_certificate() {
        let port = serve(SELF_SIGNED_CRT, SELF_SIGNED_KEY).await;
        verifier(port)
            .handshake(SELF_SIGNED_CRT, SELF_SIGNED_KEY, "localhost")
            .await
            .expect("handshake must succeed");

        let error = verifier(port)
            .handshake(SELF_SIGNED_CRT, SELF_SIGNED_KEY, "127.0.0.1")
            .await
            .expect_err("name must still be checked");
        assert!(matches!(error, Error::Handshake { .. }), "{error}");

        let error = verifier(port)
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "localhost")
            .await
            .expect_err("another certificate must not be accepted");
        assert!(matches!(error, Error::Handshake { .. }), "{error}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_host_serving_another_certificate() {
        let port = serve(OTHER_CRT, OTHER_KEY).await;
        let error = verifier(port)
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "localhost")
            .await
            .expect_err("handshake must fail");
        assert!(matches!(error, Error::Handshake { .. }), "{error}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_name_not_covered_by_the_certificate() {
        let port = serve(LOCALHOST_CRT, LOCALHOST_KEY).await;
        let error = verifier(port)
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "127.0.0.1")
            .await
            .expect_err("handshake must fail");
        assert!(matches!(error, Error::Handshake { .. }), "{error}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn malformed_material_is_an_error() {
        let verifier = verifier(DEFAULT_PORT);

        let error = verifier
            .handshake(b"test-crt", b"test-key", "localhost")
            .await
            .expect_err("garbage certificate must fail");
        assert!(matches!(error, Error::NoCertificate), "{error}");

        let error = verifier
            .handshake(LOCALHOST_CRT, b"test-key", "localhost")
            .await
            .expect_err("garbage key must fail");
        assert!(matches!(error, Error::NoKey), "{error}");

        // Surfaces through the trait as an ordinary error.
        assert!(Verify::verify(&verifier, b"", b"", "localhost")
            .await
            .is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn closed_port_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("must bind");
        let port = listener.local_addr().expect("must have address").port();
        drop(listener);

        let error = verifier(port)
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "127.0.0.1")
            .await
            .expect_err("connect must fail");
        assert!(matches!(error, Error::Connect { .. }), "{error}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("must bind");
        let port = listener.local_addr().expect("must have address").port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((tcp, _)) = listener.accept().await {
                held.push(tcp);
            }
        });

        let error = Verifier::new(port, Duration::from_millis(200))
            .handshake(LOCALHOST_CRT, LOCALHOST_KEY, "localhost")
            .await
            .expect_err("handshake must time out");
        assert!(matches!(error, Error::Timeout { .. }), "{error}");
    }
}
