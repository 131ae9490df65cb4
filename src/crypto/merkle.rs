//! Merkle tree machinery using BLAKE3
//!
//! Provides the deterministic binary-tree reduction used for file parts and
//! header-tree aggregation, a streaming per-part hasher, and the compact
//! `(op, hash)` proof format.

use blake3::Hasher;
use thiserror::Error;

/// Size in bytes of every hash in the system.
pub const HASH_SIZE: usize = 32;

/// A BLAKE3 hash value.
pub type Hash = [u8; HASH_SIZE];

/// Proof operation: the recorded hash is the left argument, `h := H(arg ‖ h)`.
pub const OP_LHASH: u8 = 0;
/// Proof operation: the recorded hash is the right argument, `h := H(h ‖ arg)`.
pub const OP_RHASH: u8 = 1;

const PROOF_RECORD_SIZE: usize = 1 + HASH_SIZE;

/// Merkle-proof errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof length is not a multiple of {PROOF_RECORD_SIZE}")]
    Malformed,

    #[error("unknown proof op byte: {0}")]
    UnknownOp(u8),

    #[error("leaf index {index} out of range for {count} leaves")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Hash a single byte string.
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash the concatenation of two byte strings.
pub fn hash_pair(a: &[u8], b: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(a);
    hasher.update(b);
    *hasher.finalize().as_bytes()
}

/// Split point of a merkle tree over `n` items: the largest power of two
/// strictly below `n` (0 for trees of at most one item).
pub fn merkle_middle(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        1 << (usize::BITS - 1 - (n - 1).leading_zeros())
    }
}

/// Merkle root of a list of hashes. Empty input yields no root.
pub fn merkle_root(hashes: &[Hash]) -> Option<Hash> {
    make_merkle_root(hashes.len(), &|i| hashes[i])
}

/// Merkle root over `n` items whose hashes are produced on demand.
pub fn make_merkle_root(n: usize, item_hash: &dyn Fn(usize) -> Hash) -> Option<Hash> {
    merkle_root_range(0, n, item_hash)
}

fn merkle_root_range(offset: usize, n: usize, item_hash: &dyn Fn(usize) -> Hash) -> Option<Hash> {
    match n {
        0 => None,
        1 => Some(item_hash(offset)),
        _ => {
            let m = merkle_middle(n);
            let left = merkle_root_range(offset, m, item_hash)?;
            let right = merkle_root_range(offset + m, n - m, item_hash)?;
            Some(hash_pair(&left, &right))
        }
    }
}

/// Build the proof for leaf `i` among `hashes`. The entry at `i` itself is
/// never read; only sibling subtree roots enter the proof.
pub fn make_merkle_proof(hashes: &[Hash], i: usize) -> Result<Vec<u8>, ProofError> {
    let n = hashes.len();
    if i >= n {
        return Err(ProofError::IndexOutOfRange { index: i, count: n });
    }
    let mut proof = Vec::new();
    make_merkle_proof_into(&mut proof, hashes, i);
    Ok(proof)
}

fn make_merkle_proof_into(proof: &mut Vec<u8>, hashes: &[Hash], i: usize) {
    let n = hashes.len();
    if n == 1 {
        return;
    }
    let m = merkle_middle(n);
    if i < m {
        make_merkle_proof_into(proof, &hashes[..m], i);
        if let Some(right) = merkle_root(&hashes[m..]) {
            append_merkle_proof(proof, OP_RHASH, &right);
        }
    } else {
        make_merkle_proof_into(proof, &hashes[m..], i - m);
        if let Some(left) = merkle_root(&hashes[..m]) {
            append_merkle_proof(proof, OP_LHASH, &left);
        }
    }
}

/// Append one `(op, hash)` record. An empty hash is skipped.
pub fn append_merkle_proof(proof: &mut Vec<u8>, op: u8, hash: &[u8]) {
    if !hash.is_empty() {
        proof.push(op);
        proof.extend_from_slice(hash);
    }
}

/// Replay a proof from an item hash, returning the derived root.
pub fn eval_merkle_proof(item: &Hash, proof: &[u8]) -> Result<Hash, ProofError> {
    if proof.len() % PROOF_RECORD_SIZE != 0 {
        return Err(ProofError::Malformed);
    }
    let mut h = *item;
    for rec in proof.chunks(PROOF_RECORD_SIZE) {
        let arg = &rec[1..];
        h = match rec[0] {
            OP_LHASH => hash_pair(arg, &h),
            OP_RHASH => hash_pair(&h, arg),
            op => return Err(ProofError::UnknownOp(op)),
        };
    }
    Ok(h)
}

/// Verify a proof for `item` against the claimed `root`.
pub fn verify_merkle_proof(item: &Hash, root: &[u8], proof: &[u8]) -> bool {
    matches!(eval_merkle_proof(item, proof), Ok(h) if h[..] == *root)
}

/// Streaming leaf hasher for partitioned file content.
///
/// Emits one leaf hash per full `part_size` bytes plus a final leaf for any
/// remainder. A part size of zero means a single unbounded part.
pub struct MerkleHasher {
    part_size: u64,
    written: u64,
    filled: u64,
    hasher: Hasher,
    leaves: Vec<Hash>,
}

impl MerkleHasher {
    pub fn new(part_size: u64) -> Self {
        Self {
            part_size: if part_size == 0 { u64::MAX } else { part_size },
            written: 0,
            filled: 0,
            hasher: Hasher::new(),
            leaves: Vec::new(),
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.written += data.len() as u64;
        while self.filled + data.len() as u64 >= self.part_size {
            let take = (self.part_size - self.filled) as usize;
            self.hasher.update(&data[..take]);
            data = &data[take..];
            self.leaves.push(*self.hasher.finalize().as_bytes());
            self.hasher.reset();
            self.filled = 0;
        }
        self.hasher.update(data);
        self.filled += data.len() as u64;
    }

    /// Total number of bytes consumed so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Leaf hashes of everything written, flushing any partial final part.
    pub fn leaves(&mut self) -> &[Hash] {
        self.flush_part();
        &self.leaves
    }

    /// Merkle root over the leaves. `None` when nothing was written.
    pub fn root(&mut self) -> Option<Hash> {
        self.flush_part();
        merkle_root(&self.leaves)
    }

    /// Consume the hasher, returning the leaf list.
    pub fn into_leaves(mut self) -> Vec<Hash> {
        self.flush_part();
        self.leaves
    }

    fn flush_part(&mut self) {
        if self.filled > 0 {
            self.leaves.push(*self.hasher.finalize().as_bytes());
            self.hasher.reset();
            self.filled = 0;
        }
    }
}

impl std::io::Write for MerkleHasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
