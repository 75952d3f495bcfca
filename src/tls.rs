//! TLS strategy (C3).
//!
//! A [`TlsStrategy`] turns a connected TCP stream into an encrypted,
//! ALPN-negotiated one. The handshake is always raced against the
//! handshake deadline by the caller ([`crate::transport::connector`]); this
//! module only knows how to do the handshake itself.
//!
//! Grounded on the teacher's `src/tls/conn/mod.rs` and `src/tls/builder.rs`
//! (rustls `ClientConfig` construction, root store selection), narrowed
//! from the teacher's impersonation-oriented TLS stack (JA3/JA4 fingerprint
//! profiles, BoringSSL) down to plain `rustls` + ALPN per spec §4.3.

use std::{fmt, pin::Pin, sync::Arc};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Kind, Result};
use crate::transport::BoxFuture;

/// The HTTP version negotiated over a connection (plaintext connections
/// are always [`Protocol::Http1`] in this crate; ALPN decides it for TLS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

/// An I/O stream suitable for driving a hyper connection, with its
/// concrete type erased — a plain [`TcpStream`] or a
/// [`tokio_rustls::client::TlsStream`], depending on the route.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncIo for T {}

pub type BoxedIo = Pin<Box<dyn AsyncIo>>;

/// How the peer certificate's identity is checked against the route's
/// host name (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnamePolicy {
    /// Standard CA + host name verification via the configured root store.
    Builtin,
    /// Verification is delegated to an embedder-supplied verifier.
    Client,
    /// No verification at all (`danger_accept_invalid_certs`). Never the
    /// default; must be opted into explicitly via
    /// [`crate::config::ClientConfigBuilder::danger_accept_invalid_certs`].
    None,
}

/// Where the trust roots come from when [`HostnamePolicy::Builtin`] is in
/// effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStore {
    WebpkiRoots,
    NativeRoots,
}

/// An additional check run after the session's own certificate
/// verification succeeds (spec §4.3 `HostnamePolicy::Client`: "performs an
/// explicit verifier after the session reports verified, against the
/// original server name") — e.g. SPKI pinning. A rejection here surfaces as
/// [`Kind::TlsPeerUnverified`], distinct from the session's own
/// [`Kind::TlsVerification`] failures.
pub trait PeerVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, end_entity: &rustls::pki_types::CertificateDer<'_>, server_name: &str) -> std::result::Result<(), crate::error::BoxError>;
}

/// Upgrades a connected TCP stream to TLS (C3's `upgrade()` operation).
pub trait TlsStrategy: Send + Sync + fmt::Debug {
    /// Perform the TLS handshake, returning the negotiated [`Protocol`]
    /// from ALPN (`h2` vs `http/1.1`, defaulting to HTTP/1.1 if the peer
    /// offers no ALPN extension).
    fn upgrade<'a>(&'a self, tcp: TcpStream, server_name: &'a str) -> BoxFuture<'a, Result<(BoxedIo, Protocol)>>;
}

/// The crate's only shipped [`TlsStrategy`]: `rustls` with ALPN advertising
/// both `h2` and `http/1.1`.
#[derive(Clone)]
pub struct RustlsStrategy {
    connector: tokio_rustls::TlsConnector,
}

impl fmt::Debug for RustlsStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsStrategy").finish_non_exhaustive()
    }
}

impl RustlsStrategy {
    pub fn new(root_store: RootStore) -> Result<RustlsStrategy> {
        Self::build(HostnamePolicy::Builtin, root_store, None)
    }

    /// Build a strategy that never verifies the peer
    /// (`danger_accept_invalid_certs`). Spec §4.3 requires this stay an
    /// explicit, separate constructor rather than a flag a verifier can
    /// silently ignore.
    pub fn accepting_invalid_certs() -> Result<RustlsStrategy> {
        Self::build(HostnamePolicy::None, RootStore::WebpkiRoots, None)
    }

    /// Build a strategy that runs `verifier` after the session's own
    /// verification succeeds (`HostnamePolicy::Client`).
    pub fn with_peer_verifier(root_store: RootStore, verifier: Arc<dyn PeerVerifier>) -> Result<RustlsStrategy> {
        Self::build(HostnamePolicy::Client, root_store, Some(verifier))
    }

    fn build(policy: HostnamePolicy, root_store: RootStore, peer_verifier: Option<Arc<dyn PeerVerifier>>) -> Result<RustlsStrategy> {
        let mut config = match policy {
            HostnamePolicy::None => rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification))
                .with_no_client_auth(),
            HostnamePolicy::Builtin => {
                let roots = Arc::new(build_root_store(root_store)?);
                rustls::ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth()
            }
            HostnamePolicy::Client => {
                let roots = Arc::new(build_root_store(root_store)?);
                let session_verifier = rustls::client::WebPkiServerVerifier::builder(roots)
                    .build()
                    .map_err(Error::builder)?;
                let verifier = peer_verifier.expect("HostnamePolicy::Client requires a PeerVerifier");
                rustls::ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(ClientPeerVerifier { session_verifier, verifier }))
                    .with_no_client_auth()
            }
        };
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        Ok(RustlsStrategy {
            connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

/// Rejection marker threaded through `rustls::Error::General` so
/// [`classify_handshake_error`] can tell a [`PeerVerifier`] rejection apart
/// from an ordinary certificate verification failure.
const PEER_VERIFIER_REJECTED: &str = "peer verification rejected by client verifier";

#[derive(Debug)]
struct ClientPeerVerifier {
    session_verifier: Arc<dyn rustls::client::danger::ServerCertVerifier>,
    verifier: Arc<dyn PeerVerifier>,
}

impl rustls::client::danger::ServerCertVerifier for ClientPeerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        intermediates: &[rustls::pki_types::CertificateDer<'_>],
        server_name: &rustls::pki_types::ServerName<'_>,
        ocsp_response: &[u8],
        now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        self.session_verifier
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;
        let host = match server_name {
            rustls::pki_types::ServerName::DnsName(name) => name.as_ref(),
            _ => "",
        };
        self.verifier
            .verify(end_entity, host)
            .map_err(|_| rustls::Error::General(PEER_VERIFIER_REJECTED.to_string()))?;
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.session_verifier.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.session_verifier.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.session_verifier.supported_verify_schemes()
    }
}

fn build_root_store(source: RootStore) -> Result<rustls::RootCertStore> {
    let mut store = rustls::RootCertStore::empty();
    match source {
        RootStore::WebpkiRoots => {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        RootStore::NativeRoots => {
            let native = rustls_native_certs::load_native_certs();
            for cert in native.certs {
                store.add(cert).map_err(|e| Error::with_source(Kind::TlsProtocol, e))?;
            }
        }
    }
    Ok(store)
}

impl TlsStrategy for RustlsStrategy {
    fn upgrade<'a>(&'a self, tcp: TcpStream, server_name: &'a str) -> BoxFuture<'a, Result<(BoxedIo, Protocol)>> {
        Box::pin(async move {
            let name = rustls::pki_types::ServerName::try_from(server_name.to_string())
                .map_err(|e| Error::with_source(Kind::TlsProtocol, e))?;
            let stream = self
                .connector
                .connect(name, tcp)
                .await
                .map_err(classify_handshake_error)?;
            let protocol = match stream.get_ref().1.alpn_protocol() {
                Some(proto) if proto == b"h2" => Protocol::Http2,
                _ => Protocol::Http1,
            };
            Ok((Box::pin(stream) as BoxedIo, protocol))
        })
    }
}

/// `tokio_rustls::TlsConnector::connect` reports every handshake failure as
/// an `io::Error` wrapping the underlying `rustls::Error`; unwrap that to
/// tell a failed certificate chain (`TlsVerification`) apart from a
/// handshake failure below the verification layer (`TlsProtocol`).
fn classify_handshake_error(e: std::io::Error) -> Error {
    match e.into_inner().and_then(|inner| inner.downcast::<rustls::Error>().ok()) {
        Some(rustls_err) => match &*rustls_err {
            rustls::Error::General(msg) if msg == PEER_VERIFIER_REJECTED => Error::with_source(Kind::TlsPeerUnverified, rustls_err),
            rustls::Error::InvalidCertificate(_) | rustls::Error::UnsupportedNameType | rustls::Error::NoCertificatesPresented => {
                Error::with_source(Kind::TlsVerification, rustls_err)
            }
            _ => Error::with_source(Kind::TlsProtocol, rustls_err),
        },
        None => Error::with_source(Kind::TlsProtocol, e),
    }
}

#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
