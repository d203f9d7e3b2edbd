//! # TLS Configuration
//!
//! rustls client and server configurations for mutually-authenticated
//! TLS 1.3 between peers:
//!
//! - Both sides present a certificate; client authentication is mandatory.
//! - Certificate chains are exactly one certificate deep and self-signed.
//! - Identity is established by the certificate's identity extension, not by
//!   any CA chain, so both verifiers run the full peer-certificate check and
//!   ignore the WebPKI trust model entirely.
//!
//! The dialing side knows which peer it intends to reach and pins that
//! identity; the listening side accepts any peer that proves an identity.
//!
//! ## SECURITY WARNING
//!
//! The `dangerous()` rustls APIs are used intentionally: trust here means
//! "the certificate is cryptographically bound to an identity key", never
//! "a CA vouches for this name".

use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::pki_types::CertificateDer;
use tracing::debug;

use crate::certificate::{verify_peer_certificate, CertificateError};
use crate::peer_id::PeerId;

/// Lazily-initialized crypto provider for rustls.
/// Uses ring as the underlying cryptographic implementation; bound once for
/// the whole process.
static CRYPTO_PROVIDER: std::sync::LazyLock<Arc<rustls::crypto::CryptoProvider>> =
    std::sync::LazyLock::new(|| Arc::new(rustls::crypto::ring::default_provider()));

/// ALPN protocol identifier for peer connections.
pub const ALPN: &[u8] = b"libp2p";

/// Only TLS 1.3 is ever negotiated.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Build a client (dialing) TLS configuration for the local peer.
///
/// When `remote_peer` is given, the handshake fails unless the server proves
/// exactly that identity.
pub fn make_client_config(
    local_peer: &PeerId,
    remote_peer: Option<PeerId>,
) -> Result<rustls::ClientConfig> {
    let (cert, key) = crate::certificate::generate_tls_identity(local_peer)
        .context("failed to generate handshake certificate")?;
    let verifier = Arc::new(PeerVerifier::new(remote_peer));

    let mut config = rustls::ClientConfig::builder_with_provider(CRYPTO_PROVIDER.clone())
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .context("failed to select TLS 1.3")?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(vec![cert], key)
        .context("failed to create client TLS config with client auth")?;
    config.alpn_protocols = vec![ALPN.to_vec()];

    debug!(peer = %local_peer, "built client TLS config");
    Ok(config)
}

/// Build a server (listening) TLS configuration for the local peer.
///
/// Client certificates are required; any peer that proves an identity is
/// accepted and its [`PeerId`] can be re-derived from the presented
/// certificate after the handshake.
pub fn make_server_config(local_peer: &PeerId) -> Result<rustls::ServerConfig> {
    let (cert, key) = crate::certificate::generate_tls_identity(local_peer)
        .context("failed to generate handshake certificate")?;
    let verifier = Arc::new(PeerVerifier::new(None));

    let mut config = rustls::ServerConfig::builder_with_provider(CRYPTO_PROVIDER.clone())
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .context("failed to select TLS 1.3")?
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![cert], key)
        .context("failed to create server TLS config")?;
    config.alpn_protocols = vec![ALPN.to_vec()];

    debug!(peer = %local_peer, "built server TLS config");
    Ok(config)
}

/// Certificate verifier for both directions of the handshake.
///
/// Runs the full identity verification on the presented end-entity
/// certificate and, on the dialing side, pins the expected peer.
#[derive(Debug)]
struct PeerVerifier {
    remote_peer: Option<PeerId>,
}

impl PeerVerifier {
    fn new(remote_peer: Option<PeerId>) -> Self {
        Self { remote_peer }
    }

    fn check_certificate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        expected: Option<&PeerId>,
    ) -> std::result::Result<PeerId, rustls::Error> {
        if !intermediates.is_empty() {
            return Err(rustls::Error::General(
                "peer presented more than one certificate".into(),
            ));
        }
        verify_peer_certificate(end_entity.as_ref(), expected).map_err(to_rustls_error)
    }
}

fn to_rustls_error(err: CertificateError) -> rustls::Error {
    use rustls::CertificateError::*;
    let kind = match err {
        CertificateError::InvalidCertificate => BadEncoding,
        CertificateError::CertificateNotYetValid => NotValidYet,
        CertificateError::CertificateExpired => Expired,
        CertificateError::InvalidSelfSignature | CertificateError::InvalidCrossSignature => {
            BadSignature
        }
        _ => ApplicationVerificationFailure,
    };
    rustls::Error::InvalidCertificate(kind)
}

impl rustls::client::danger::ServerCertVerifier for PeerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        self.check_certificate(end_entity, intermediates, self.remote_peer.as_ref())?;
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        CRYPTO_PROVIDER
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl rustls::server::danger::ClientCertVerifier for PeerVerifier {
    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::server::danger::ClientCertVerified, rustls::Error> {
        self.check_certificate(end_entity, intermediates, None)?;
        Ok(rustls::server::danger::ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &CRYPTO_PROVIDER.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        CRYPTO_PROVIDER
            .signature_verification_algorithms
            .supported_schemes()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use rustls::client::danger::ServerCertVerifier;

    #[test]
    fn client_and_server_configs_build() {
        let local = PeerId::from_keypair(Keypair::generate_ed25519());
        let remote = PeerId::from_keypair(Keypair::generate_ed25519());

        let client =
            make_client_config(&local, Some(remote)).expect("client config must build");
        assert_eq!(client.alpn_protocols, vec![ALPN.to_vec()]);

        let server = make_server_config(&local).expect("server config must build");
        assert_eq!(server.alpn_protocols, vec![ALPN.to_vec()]);
    }

    #[test]
    fn verifier_accepts_a_valid_peer_certificate() {
        let peer = PeerId::from_keypair(Keypair::generate_ed25519());
        let pair = crate::certificate::generate_certificate(&peer).expect("generate");
        let cert = CertificateDer::from(pair.cert_der.clone());

        let verifier = PeerVerifier::new(Some(peer.clone()));
        let derived = verifier
            .check_certificate(&cert, &[], Some(&peer))
            .expect("valid certificate must pass");
        assert_eq!(derived, peer);
    }

    #[test]
    fn verifier_rejects_certificate_chains() {
        let peer = PeerId::from_keypair(Keypair::generate_ed25519());
        let pair = crate::certificate::generate_certificate(&peer).expect("generate");
        let cert = CertificateDer::from(pair.cert_der.clone());

        let verifier = PeerVerifier::new(None);
        let result = verifier.check_certificate(&cert, std::slice::from_ref(&cert), None);
        assert!(result.is_err(), "intermediates must be refused");
    }

    #[test]
    fn verifier_pins_the_dialed_peer() {
        let peer_a = PeerId::from_keypair(Keypair::generate_ed25519());
        let peer_b = PeerId::from_keypair(Keypair::generate_ed25519());
        let pair = crate::certificate::generate_certificate(&peer_a).expect("generate");
        let cert = CertificateDer::from(pair.cert_der.clone());

        let verifier = PeerVerifier::new(Some(peer_b.clone()));
        let result = verifier.check_certificate(&cert, &[], Some(&peer_b));
        assert!(
            matches!(
                result,
                Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure
                ))
            ),
            "a different peer's certificate must be refused"
        );
    }

    #[test]
    fn supported_schemes_cover_the_certificate_algorithm() {
        let verifier = PeerVerifier::new(None);
        let schemes = ServerCertVerifier::supported_verify_schemes(&verifier);
        assert!(
            schemes.contains(&rustls::SignatureScheme::ECDSA_NISTP256_SHA256),
            "P-256 handshake certificates must be verifiable"
        );
    }
}
