//! # Peer Identity Derivation
//!
//! A [`PeerId`] is the stable, transport-independent name of a peer: the
//! multihash of its marshaled public-key envelope. Small keys (Ed25519,
//! Secp256k1) are inlined with the identity hash; larger keys (RSA) are
//! digested with SHA-256. Two peer ids are equal iff their multihash bytes
//! are equal.
//!
//! A `PeerId` may additionally carry key material: the public key when it is
//! recoverable (always, for identity-hashed ids), and the private keypair for
//! the local peer. The certificate builder consumes a local `PeerId` and the
//! verifier produces a remote one.

use multihash::Multihash;
use sha2::{Digest, Sha256};

use crate::identity::{Keypair, PublicKey};

/// Multihash code for the identity (inline) hash.
const MULTIHASH_IDENTITY: u64 = 0x00;

/// Multihash code for SHA2-256.
const MULTIHASH_SHA2_256: u64 = 0x12;

/// Marshaled public keys up to this size are inlined into the peer id with
/// the identity hash; anything larger is digested with SHA-256.
const MAX_INLINE_KEY_LEN: usize = 42;

/// Error type for parsing a peer id from bytes or text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerIdError {
    /// Not valid base58btc.
    InvalidBase58,
    /// The bytes are not a well-formed multihash.
    InvalidMultihash,
    /// The multihash uses a code other than identity or SHA2-256.
    UnsupportedMultihashCode(u64),
    /// An identity-hashed peer id whose digest is not a valid key envelope.
    InvalidInlineKey,
}

impl std::fmt::Display for PeerIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerIdError::InvalidBase58 => write!(f, "peer id is not valid base58btc"),
            PeerIdError::InvalidMultihash => write!(f, "peer id is not a valid multihash"),
            PeerIdError::UnsupportedMultihashCode(code) => {
                write!(f, "peer id uses unsupported multihash code {code:#x}")
            }
            PeerIdError::InvalidInlineKey => {
                write!(f, "identity-hashed peer id does not contain a valid key")
            }
        }
    }
}

impl std::error::Error for PeerIdError {}

/// A peer identity: the multihash of the marshaled public-key envelope,
/// optionally carrying the key material it was derived from.
#[derive(Clone)]
pub struct PeerId {
    multihash: Multihash<64>,
    public_key: Option<PublicKey>,
    keypair: Option<Keypair>,
}

impl PeerId {
    /// Derive a peer id from a public key.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let encoded = public_key.encode_protobuf();
        let multihash = if encoded.len() <= MAX_INLINE_KEY_LEN {
            Multihash::wrap(MULTIHASH_IDENTITY, &encoded)
        } else {
            Multihash::wrap(MULTIHASH_SHA2_256, &Sha256::digest(&encoded))
        }
        .expect("inline key and SHA-256 digests fit a 64-byte multihash");

        Self {
            multihash,
            public_key: Some(public_key.clone()),
            keypair: None,
        }
    }

    /// Derive a local peer id, keeping the private key attached so the peer
    /// can later prove the identity it claims.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let mut peer_id = Self::from_public_key(&keypair.public());
        peer_id.keypair = Some(keypair);
        peer_id
    }

    /// Reconstruct a local peer id from a stored private-key envelope.
    pub fn from_private_key_protobuf(bytes: &[u8]) -> Result<Self, crate::identity::KeyError> {
        Ok(Self::from_keypair(Keypair::from_protobuf_encoding(bytes)?))
    }

    /// Parse a peer id from raw multihash bytes.
    ///
    /// For identity-hashed ids the embedded public key is recovered and must
    /// be valid; SHA-256 ids carry no recoverable key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PeerIdError> {
        let multihash =
            Multihash::<64>::from_bytes(bytes).map_err(|_| PeerIdError::InvalidMultihash)?;

        let public_key = match multihash.code() {
            MULTIHASH_IDENTITY => Some(
                PublicKey::decode_protobuf(multihash.digest())
                    .map_err(|_| PeerIdError::InvalidInlineKey)?,
            ),
            MULTIHASH_SHA2_256 => None,
            other => return Err(PeerIdError::UnsupportedMultihashCode(other)),
        };

        Ok(Self {
            multihash,
            public_key,
            keypair: None,
        })
    }

    /// The multihash bytes. This is the canonical binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.multihash.to_bytes()
    }

    /// The public key, when known. Always present for peer ids produced by
    /// derivation or verification; absent for SHA-256 ids parsed from text.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// The private keypair, present only on the local peer's own id.
    pub fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_ref()
    }
}

impl PartialEq for PeerId {
    fn eq(&self, other: &Self) -> bool {
        self.multihash == other.multihash
    }
}

impl Eq for PeerId {}

impl std::hash::Hash for PeerId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.multihash.hash(state);
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&bs58::encode(self.to_bytes()).into_string())
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PeerId").field(&self.to_string()).finish()
    }
}

impl std::str::FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| PeerIdError::InvalidBase58)?;
        Self::from_bytes(&bytes)
    }
}
