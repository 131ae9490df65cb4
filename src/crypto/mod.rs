//! Cryptographic primitives: BLAKE3 merkle machinery and Ed25519 keys.

pub mod keys;
pub mod merkle;
