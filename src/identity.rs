//! # Identity Keys
//!
//! This module defines the long-lived identity keys that a peer proves
//! possession of during the handshake:
//!
//! - [`Keypair`]: the private identity key (Ed25519, Secp256k1, or RSA)
//! - [`PublicKey`]: the public half, as carried inside the certificate
//! - [`KeyType`]: the wire-level key type tag
//!
//! ## Identity Model
//!
//! A peer's identity is its public key. The key never participates in TLS
//! directly; instead it signs a statement binding the ephemeral TLS key to
//! itself (see the certificate module). Three algorithms are supported:
//!
//! | Type | `data` encoding | Signature |
//! |------|-----------------|-----------|
//! | Ed25519 | raw 32-byte public key | EdDSA, 64 bytes |
//! | Secp256k1 | 33-byte compressed point | ECDSA over SHA-256, DER |
//! | RSA | SubjectPublicKeyInfo DER | PKCS#1 v1.5 with SHA-256 |
//!
//! ## Security Invariants
//!
//! - Signature verification is a total function: malformed keys or signatures
//!   verify as `false`, they never panic or surface decode errors.
//! - Private key material is never logged; `Debug` impls redact it.

use ed25519_dalek::Signer;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::Pkcs1v15Sign;
use secp256k1::SECP256K1;
use sha2::{Digest, Sha256};

use crate::wire;

// ============================================================================
// Errors
// ============================================================================

/// Error type for identity key construction, decoding, and signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// The key type tag is outside the supported set.
    UnsupportedKeyType(u64),
    /// The key bytes do not match the encoding required by the key type,
    /// or the surrounding protobuf framing is invalid.
    MalformedKey,
    /// The private key refused to produce a signature.
    SigningFailed,
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyError::UnsupportedKeyType(tag) => write!(f, "unsupported key type {tag}"),
            KeyError::MalformedKey => write!(f, "malformed key data"),
            KeyError::SigningFailed => write!(f, "signing failed"),
        }
    }
}

impl std::error::Error for KeyError {}

// ============================================================================
// Key Types
// ============================================================================

/// Supported identity key algorithms, with their wire-level tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
    Rsa,
    Secp256k1,
}

impl KeyType {
    pub(crate) fn from_wire(tag: u64) -> Result<Self, KeyError> {
        match tag {
            0 => Ok(KeyType::Ed25519),
            1 => Ok(KeyType::Rsa),
            2 => Ok(KeyType::Secp256k1),
            other => Err(KeyError::UnsupportedKeyType(other)),
        }
    }

    pub(crate) fn wire(self) -> u64 {
        match self {
            KeyType::Ed25519 => 0,
            KeyType::Rsa => 1,
            KeyType::Secp256k1 => 2,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "Ed25519"),
            KeyType::Rsa => write!(f, "RSA"),
            KeyType::Secp256k1 => write!(f, "Secp256k1"),
        }
    }
}

// ============================================================================
// Public Keys
// ============================================================================

/// A peer's public identity key.
#[derive(Clone)]
pub enum PublicKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Secp256k1(secp256k1::PublicKey),
    Rsa {
        key: rsa::RsaPublicKey,
        /// The validated SPKI DER this key was built from. Kept verbatim so
        /// that marshaling round-trips bit-exactly and the derived peer
        /// identity is stable.
        spki: Vec<u8>,
    },
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::Secp256k1(_) => KeyType::Secp256k1,
            PublicKey::Rsa { .. } => KeyType::Rsa,
        }
    }

    /// Construct a public key from a wire type tag and the per-type `data`
    /// encoding.
    pub fn from_parts(key_type: KeyType, data: &[u8]) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Ed25519 => {
                let bytes: [u8; 32] = data.try_into().map_err(|_| KeyError::MalformedKey)?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|_| KeyError::MalformedKey)?;
                Ok(PublicKey::Ed25519(key))
            }
            KeyType::Secp256k1 => {
                if data.len() != 33 {
                    return Err(KeyError::MalformedKey);
                }
                let key =
                    secp256k1::PublicKey::from_slice(data).map_err(|_| KeyError::MalformedKey)?;
                Ok(PublicKey::Secp256k1(key))
            }
            KeyType::Rsa => {
                let key = rsa::RsaPublicKey::from_public_key_der(data)
                    .map_err(|_| KeyError::MalformedKey)?;
                Ok(PublicKey::Rsa {
                    key,
                    spki: data.to_vec(),
                })
            }
        }
    }

    /// The per-type byte encoding: raw 32 bytes (Ed25519), 33-byte compressed
    /// point (Secp256k1), or SPKI DER (RSA).
    pub fn marshal(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::Secp256k1(key) => key.serialize().to_vec(),
            PublicKey::Rsa { spki, .. } => spki.clone(),
        }
    }

    /// Verify `signature` over `message`.
    ///
    /// Returns `false` on any failure, including signatures that do not
    /// decode. No error detail leaks to the caller.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519(key) => {
                let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify_strict(message, &sig).is_ok()
            }
            PublicKey::Secp256k1(key) => {
                let Ok(sig) = secp256k1::ecdsa::Signature::from_der(signature) else {
                    return false;
                };
                let digest: [u8; 32] = Sha256::digest(message).into();
                let msg = secp256k1::Message::from_digest(digest);
                SECP256K1.verify_ecdsa(&msg, &sig, key).is_ok()
            }
            PublicKey::Rsa { key, .. } => {
                let digest = Sha256::digest(message);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .is_ok()
            }
        }
    }

    /// Encode as the key protobuf envelope (type tag + `data`).
    pub fn encode_protobuf(&self) -> Vec<u8> {
        wire::encode_key(self.key_type().wire(), &self.marshal())
    }

    /// Decode a key protobuf envelope into a public key.
    pub fn decode_protobuf(bytes: &[u8]) -> Result<Self, KeyError> {
        let envelope = wire::decode_key(bytes).map_err(|_| KeyError::MalformedKey)?;
        let key_type = KeyType::from_wire(envelope.key_type)?;
        Self::from_parts(key_type, &envelope.data)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_type() == other.key_type() && self.marshal() == other.marshal()
    }
}

impl Eq for PublicKey {}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("type", &self.key_type())
            .field("data", &hex::encode(self.marshal()))
            .finish()
    }
}

// ============================================================================
// Keypairs
// ============================================================================

/// A private identity key together with its public half.
#[derive(Clone)]
pub enum Keypair {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(secp256k1::SecretKey),
    Rsa(rsa::RsaPrivateKey),
}

impl Keypair {
    pub fn generate_ed25519() -> Self {
        Keypair::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    pub fn generate_secp256k1() -> Self {
        Keypair::Secp256k1(secp256k1::SecretKey::new(&mut OsRng))
    }

    /// Generate an RSA keypair. Slow for 2048 bits and above; intended for
    /// process startup, not per-connection use.
    pub fn generate_rsa(bits: usize) -> anyhow::Result<Self> {
        use anyhow::Context;
        let key = rsa::RsaPrivateKey::new(&mut OsRng, bits)
            .context("failed to generate RSA identity key")?;
        Ok(Keypair::Rsa(key))
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            Keypair::Ed25519(_) => KeyType::Ed25519,
            Keypair::Secp256k1(_) => KeyType::Secp256k1,
            Keypair::Rsa(_) => KeyType::Rsa,
        }
    }

    /// The public half of this keypair.
    pub fn public(&self) -> PublicKey {
        match self {
            Keypair::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            Keypair::Secp256k1(key) => {
                PublicKey::Secp256k1(secp256k1::PublicKey::from_secret_key(SECP256K1, key))
            }
            Keypair::Rsa(key) => {
                let public = key.to_public_key();
                let spki = public
                    .to_public_key_der()
                    .expect("a valid RSA public key encodes to SPKI")
                    .as_bytes()
                    .to_vec();
                PublicKey::Rsa { key: public, spki }
            }
        }
    }

    /// Sign `message` with the algorithm belonging to this key type.
    ///
    /// Ed25519 signatures are deterministic; ECDSA and RSA may be randomized.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            Keypair::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
            Keypair::Secp256k1(key) => {
                let digest: [u8; 32] = Sha256::digest(message).into();
                let msg = secp256k1::Message::from_digest(digest);
                Ok(SECP256K1.sign_ecdsa(&msg, key).serialize_der().to_vec())
            }
            Keypair::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|_| KeyError::SigningFailed)
            }
        }
    }

    /// Encode as the key protobuf envelope. Private `data` encodings:
    /// Ed25519 is the 64-byte secret-then-public form, Secp256k1 the 32-byte
    /// scalar, RSA the PKCS#1 DER document.
    pub fn to_protobuf_encoding(&self) -> Result<Vec<u8>, KeyError> {
        let data = match self {
            Keypair::Ed25519(key) => key.to_keypair_bytes().to_vec(),
            Keypair::Secp256k1(key) => key.secret_bytes().to_vec(),
            Keypair::Rsa(key) => key
                .to_pkcs1_der()
                .map_err(|_| KeyError::MalformedKey)?
                .as_bytes()
                .to_vec(),
        };
        Ok(wire::encode_key(self.key_type().wire(), &data))
    }

    /// Decode a private-key protobuf envelope.
    pub fn from_protobuf_encoding(bytes: &[u8]) -> Result<Self, KeyError> {
        let envelope = wire::decode_key(bytes).map_err(|_| KeyError::MalformedKey)?;
        let key_type = KeyType::from_wire(envelope.key_type)?;
        match key_type {
            KeyType::Ed25519 => match envelope.data.len() {
                // Secret-then-public form; the embedded public key must match.
                64 => {
                    let bytes: [u8; 64] = envelope.data.as_slice().try_into().expect("length 64");
                    ed25519_dalek::SigningKey::from_keypair_bytes(&bytes)
                        .map(Keypair::Ed25519)
                        .map_err(|_| KeyError::MalformedKey)
                }
                // Bare 32-byte seed.
                32 => {
                    let bytes: [u8; 32] = envelope.data.as_slice().try_into().expect("length 32");
                    Ok(Keypair::Ed25519(ed25519_dalek::SigningKey::from_bytes(
                        &bytes,
                    )))
                }
                _ => Err(KeyError::MalformedKey),
            },
            KeyType::Secp256k1 => secp256k1::SecretKey::from_slice(&envelope.data)
                .map(Keypair::Secp256k1)
                .map_err(|_| KeyError::MalformedKey),
            KeyType::Rsa => rsa::RsaPrivateKey::from_pkcs1_der(&envelope.data)
                .or_else(|_| rsa::RsaPrivateKey::from_pkcs8_der(&envelope.data))
                .map(Keypair::Rsa)
                .map_err(|_| KeyError::MalformedKey),
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("type", &self.key_type())
            .field("public", &hex::encode(self.public().marshal()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_keypairs() -> Vec<Keypair> {
        vec![
            Keypair::generate_ed25519(),
            Keypair::generate_secp256k1(),
            Keypair::generate_rsa(2048).expect("RSA generation must succeed"),
        ]
    }

    #[test]
    fn marshal_lengths_match_key_type() {
        assert_eq!(Keypair::generate_ed25519().public().marshal().len(), 32);
        assert_eq!(Keypair::generate_secp256k1().public().marshal().len(), 33);
        let rsa = Keypair::generate_rsa(2048).expect("RSA generation must succeed");
        assert!(
            rsa.public().marshal().len() > 42,
            "RSA SPKI must exceed the inline-digest threshold"
        );
    }

    #[test]
    fn sign_verify_round_trip() {
        for keypair in all_keypairs() {
            let message = b"payload under test";
            let signature = keypair.sign(message).expect("signing must succeed");
            assert!(
                keypair.public().verify(message, &signature),
                "{} signature must verify",
                keypair.key_type()
            );
            assert!(
                !keypair.public().verify(b"different message", &signature),
                "{} signature must not verify a different message",
                keypair.key_type()
            );
        }
    }

    #[test]
    fn verify_is_false_on_garbage_signatures() {
        for keypair in all_keypairs() {
            let public = keypair.public();
            assert!(!public.verify(b"msg", &[]));
            assert!(!public.verify(b"msg", &[0x00]));
            assert!(!public.verify(b"msg", &[0xFF; 7]));
        }
    }

    #[test]
    fn ed25519_signatures_are_deterministic() {
        let keypair = Keypair::generate_ed25519();
        let a = keypair.sign(b"same input").expect("sign");
        let b = keypair.sign(b"same input").expect("sign");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn public_protobuf_round_trip() {
        for keypair in all_keypairs() {
            let public = keypair.public();
            let encoded = public.encode_protobuf();
            let decoded = PublicKey::decode_protobuf(&encoded).expect("decode must succeed");
            assert_eq!(decoded, public);
        }
    }

    #[test]
    fn private_protobuf_round_trip() {
        for keypair in all_keypairs() {
            let encoded = keypair.to_protobuf_encoding().expect("encode");
            let decoded = Keypair::from_protobuf_encoding(&encoded).expect("decode");
            assert_eq!(decoded.public(), keypair.public());
        }
    }

    #[test]
    fn unsupported_key_type_is_rejected() {
        let encoded = crate::wire::encode_key(7, &[0u8; 32]);
        assert_eq!(
            PublicKey::decode_protobuf(&encoded),
            Err(KeyError::UnsupportedKeyType(7))
        );
    }

    #[test]
    fn malformed_key_data_is_rejected() {
        // Ed25519 with the wrong length.
        assert_eq!(
            PublicKey::from_parts(KeyType::Ed25519, &[0u8; 31]),
            Err(KeyError::MalformedKey)
        );
        // Secp256k1 with an invalid point prefix.
        assert_eq!(
            PublicKey::from_parts(KeyType::Secp256k1, &[0u8; 33]),
            Err(KeyError::MalformedKey)
        );
        // RSA with bytes that are not SPKI DER.
        assert_eq!(
            PublicKey::from_parts(KeyType::Rsa, &[0u8; 40]),
            Err(KeyError::MalformedKey)
        );
    }

    #[test]
    fn debug_redacts_private_material() {
        let keypair = Keypair::generate_ed25519();
        let rendered = format!("{keypair:?}");
        let secret = match &keypair {
            Keypair::Ed25519(key) => hex::encode(key.to_bytes()),
            _ => unreachable!(),
        };
        assert!(
            !rendered.contains(&secret),
            "Debug output must not contain the secret key"
        );
    }
}
