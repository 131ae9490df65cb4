//! IndiFS: a single-author, versioned, content-addressed virtual filesystem.
//!
//! The authoritative state is a signed merkle tree of file and directory
//! headers. A filesystem is identified by an Ed25519 public key; only the
//! holder of the private key can publish new versions as commits. Any
//! replica holding the current root header can verify the signature,
//! request a differential commit, prove inclusion of any path, and check
//! file content part-by-part against the declared leaf hashes.

pub mod commit;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod header;
pub mod logging;
pub mod multi_reader;
pub mod path;
pub mod storage;
pub mod tree;

pub use commit::{make_commit, Commit, DirSource, MemSource, Source, SourceEntry};
pub use crypto::keys::{PrivateKey, PublicKey};
pub use crypto::merkle::{verify_merkle_proof, Hash, MerkleHasher, HASH_SIZE};
pub use error::{Error, Result, StorageError};
pub use fs::FileSystem;
pub use header::{version_is_greater, Header, DEFAULT_FILE_PART_SIZE, DEFAULT_PROTOCOL};
pub use path::{
    is_valid_path, MAX_PATH_DIR_FILES_COUNT, MAX_PATH_LEVELS, MAX_PATH_NAME_LENGTH,
};
pub use storage::{MemStorage, SledStorage, Storage, Transaction};
