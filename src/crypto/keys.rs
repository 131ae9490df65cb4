//! Ed25519 author keys
//!
//! A filesystem is bound to one public key; only the holder of the matching
//! private key can publish commits. Public keys carry a textual encoding
//! `Ed25519,<base64>` that survives header serialization as a plain string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::merkle::hash_bytes;

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

const ENCODING_PREFIX: &str = "Ed25519,";

/// Author signing key.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

/// Author verification key, the identity of a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PrivateKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Derive a key deterministically from a seed by stretching it
    /// through BLAKE3.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(SigningKey::from_bytes(&hash_bytes(seed)))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.0.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().encode())
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().ok()?;
        VerifyingKey::from_bytes(&raw).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    /// Verify a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig) = Signature::from_slice(signature) else {
            return false;
        };
        self.0.verify_strict(message, &sig).is_ok()
    }

    /// Textual encoding: `Ed25519,<base64>`.
    pub fn encode(&self) -> String {
        format!("{}{}", ENCODING_PREFIX, BASE64.encode(self.as_bytes()))
    }

    /// Decode the textual encoding. Returns `None` for anything that is not
    /// a well-formed Ed25519 key.
    pub fn decode(s: &str) -> Option<Self> {
        let b64 = s.strip_prefix(ENCODING_PREFIX)?;
        let bytes = BASE64.decode(b64).ok()?;
        Self::from_bytes(&bytes)
    }

    /// Uppercase hex of the first 16 key bytes, used for table naming.
    pub fn id128(&self) -> String {
        hex::encode_upper(&self.as_bytes()[..16])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
