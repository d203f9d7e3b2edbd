//! # Peertls - Peer Identity Layer for TLS 1.3
//!
//! Peertls authenticates peer-to-peer connections by binding a TLS 1.3
//! session to a long-lived identity key. Each handshake uses a fresh,
//! self-signed certificate carrying a critical extension in which the
//! identity key signs the certificate's own public key; verifying that
//! extension proves the remote side holds its identity private key, and the
//! remote [`PeerId`] falls out of the certificate alone.
//!
//! ## Identity Model
//!
//! - **Identity = Key**: a peer is named by the multihash of its public
//!   identity key (Ed25519, Secp256k1, or RSA).
//! - **Self-signed certs**: no PKI or CA; the certificate key is ephemeral
//!   and per-handshake, the identity key never touches TLS.
//! - **Mutual auth**: both sides present certificates and both are verified.
//!
//! ## Typical Flow
//!
//! ```no_run
//! use peertls::{Keypair, PeerId};
//!
//! let local = PeerId::from_keypair(Keypair::generate_ed25519());
//!
//! // Dial side: pin the peer we intend to reach.
//! let remote = PeerId::from_keypair(Keypair::generate_ed25519());
//! let client_config = peertls::make_client_config(&local, Some(remote)).unwrap();
//!
//! // Listen side: accept any peer that proves an identity.
//! let server_config = peertls::make_server_config(&local).unwrap();
//!
//! // After the handshake, the presented certificate yields the peer:
//! # let raw_cert: &[u8] = &[];
//! let peer = peertls::verify_peer_certificate(raw_cert, None);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|--------|
//! | `identity` | Identity keypairs and public keys across the three algorithms |
//! | `peer_id` | PeerId derivation (multihash), equality, text form |
//! | `wire` | Protobuf framing of the key envelope |
//! | `certificate` | Certificate generation and verification |
//! | `tls` | rustls client/server configuration with identity-pinning verifiers |
//! | `stream` | Adapters between byte I/O and chunk-oriented duplex transports |

mod certificate;
mod identity;
mod peer_id;
mod stream;
mod tls;
mod wire;

pub use certificate::{
    generate_certificate, signature_payload, verify_peer_certificate, CertificateError,
    CertificatePair,
};
pub use identity::{KeyError, KeyType, Keypair, PublicKey};
pub use peer_id::{PeerId, PeerIdError};
pub use stream::{duplex_to_io, io_to_duplex, ChunkDuplex, DuplexIo};
pub use tls::{make_client_config, make_server_config, ALPN};
