//! The filesystem facade and the commit applier
//!
//! A `FileSystem` binds a public key to a storage table and holds the
//! current header tree behind a reader–writer lock. Readers take an `Arc`
//! snapshot of the tree; applying a commit validates everything against the
//! signed candidate root, writes content inside one storage transaction,
//! and only then swaps the tree.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::commit::Commit;
use crate::crypto::keys::PublicKey;
use crate::crypto::merkle::{Hash, MerkleHasher};
use crate::error::{Error, Result, StorageError};
use crate::header::{
    self, protocol_ver64, protocol_ver_major, version_is_greater, Header, DEFAULT_PROTOCOL,
};
use crate::multi_reader::MultiReader;
use crate::storage::Storage;
use crate::tree::{index_tree, Tree};

/// Reserved storage key holding the JSON header list.
pub const DB_KEY_HEADERS: &str = ".";

/// Single-author virtual filesystem over a storage table.
pub struct FileSystem {
    id: String,
    public_key: PublicKey,
    db: Arc<dyn Storage>,
    nodes: RwLock<Arc<Tree>>,
}

impl FileSystem {
    /// Open the filesystem bound to `public_key`, loading the persisted
    /// header set or starting fresh at version zero.
    pub fn open(public_key: PublicKey, db: Arc<dyn Storage>) -> Result<Self> {
        let id = format!("ifs{}", public_key.id128());
        let headers = match db.open_at(&id, DB_KEY_HEADERS, 0) {
            Ok(mut r) => {
                let mut data = Vec::new();
                r.read_to_end(&mut data)?;
                if data.is_empty() {
                    vec![Header::new_root(&public_key)]
                } else {
                    serde_json::from_slice(&data)?
                }
            }
            Err(StorageError::NotFound) => vec![Header::new_root(&public_key)],
            Err(e) => return Err(e.into()),
        };
        let tree = index_tree(headers)?;
        debug!(id = %id, nodes = tree.len(), "filesystem opened");
        Ok(Self {
            id,
            public_key,
            db,
            nodes: RwLock::new(Arc::new(tree)),
        })
    }

    /// Storage table name derived from the public key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.nodes.read())
    }

    /// The current signed root header.
    pub fn root(&self) -> Header {
        let tree = self.snapshot();
        match tree.root() {
            Some(nd) => nd.header.clone(),
            None => Header::new_root(&self.public_key),
        }
    }

    /// Fix the file partition size before the first commit. The value is
    /// carried in the root header and may not change across versions.
    pub fn set_part_size(&self, part_size: u64) {
        let mut guard = self.nodes.write();
        let mut tree = (**guard).clone();
        if let Some(root) = tree.root_mut() {
            root.header.set_u64(header::PART_SIZE, part_size);
        }
        *guard = Arc::new(tree);
    }

    /// Every current header, sorted by path.
    pub fn headers(&self) -> Vec<Header> {
        self.snapshot().headers()
    }

    /// Header of a file or directory.
    pub fn file_header(&self, path: &str) -> Result<Header> {
        self.snapshot()
            .get(path)
            .map(|nd| nd.header.clone())
            .ok_or(Error::NotFound)
    }

    /// Children of a live directory in path order. A fresh filesystem has
    /// no `/` header yet; its root directory lists as empty.
    pub fn read_dir(&self, path: &str) -> Result<Vec<Header>> {
        let tree = self.snapshot();
        match tree.get(path) {
            Some(nd) if nd.is_dir() && !nd.header.deleted() => Ok(nd
                .children
                .iter()
                .filter_map(|c| tree.get(c))
                .map(|c| c.header.clone())
                .collect()),
            None if path == "/" => Ok(Vec::new()),
            _ => Err(Error::NotFound),
        }
    }

    /// Header hash and merkle proof for a path, verifiable against the
    /// signed root `Merkle`.
    pub fn file_merkle_proof(&self, path: &str) -> Result<(Hash, Vec<u8>)> {
        self.snapshot().file_merkle_proof(path).ok_or(Error::NotFound)
    }

    /// Recompute the part hashes of a stored file. Their merkle root equals
    /// the header's `Merkle` field.
    pub fn file_parts(&self, path: &str) -> Result<Vec<Hash>> {
        let tree = self.snapshot();
        let nd = tree.get(path).ok_or(Error::NotFound)?;
        let mut part_size = nd.header.part_size();
        if part_size == 0 {
            part_size = tree.root().map(|r| r.header.part_size()).unwrap_or(0);
        }

        let mut r = self.open_at(path, 0)?;
        let mut w = MerkleHasher::new(part_size);
        std::io::copy(&mut r, &mut w)?;
        Ok(w.into_leaves())
    }

    /// Open stored file content at an offset.
    pub fn open_at(&self, path: &str, offset: u64) -> Result<Box<dyn Read + Send>> {
        self.db.open_at(&self.id, path, offset).map_err(|e| match e {
            StorageError::NotFound => Error::NotFound,
            e => e.into(),
        })
    }

    /// Differential commit carrying every header newer than `from_ver`,
    /// or `None` when the filesystem is not ahead of it.
    pub fn get_commit(&self, from_ver: u64) -> Result<Option<Commit>> {
        let tree = self.snapshot();
        let root_ver = tree.root().map(|nd| nd.header.ver()).unwrap_or(0);
        if root_ver <= from_ver {
            return Ok(None);
        }

        let mut headers = Vec::new();
        let mut body = MultiReader::new();
        tree.walk("", &mut |nd| {
            if nd.header.ver() > from_ver {
                headers.push(nd.header.clone());
                if nd.header.file_size() > 0 {
                    let db = Arc::clone(&self.db);
                    let table = self.id.clone();
                    let path = nd.path.clone();
                    body.add(Box::new(move || {
                        db.open_at(&table, &path, 0).map_err(storage_io_err)
                    }));
                }
            }
            true
        });
        Ok(Some(Commit {
            headers,
            body: Box::new(body),
        }))
    }

    /// Validate and apply a commit: verify the signed root, rebuild the
    /// tree, re-derive the merkle aggregates, stream the body into storage,
    /// and swap the in-memory state. Any violation aborts with no change.
    #[instrument(skip_all, fields(fs = %self.id))]
    pub fn commit(&self, commit: Commit) -> Result<()> {
        let Commit {
            mut headers,
            mut body,
        } = commit;
        let mut guard = self.nodes.write();
        let current = Arc::clone(&*guard);

        ensure(!headers.is_empty(), "empty commit")?;
        header::sort_headers(&mut headers);

        //--- verify the candidate root header
        let r = match current.root() {
            Some(nd) => nd.header.clone(),
            None => Header::new_root(&self.public_key),
        };
        let c = headers[0].clone();

        ensure(
            protocol_ver_major(c.protocol()) == protocol_ver_major(DEFAULT_PROTOCOL),
            "unsupported Protocol version",
        )?;
        ensure(
            protocol_ver64(c.protocol()) >= protocol_ver64(r.protocol()),
            "unsupported Protocol version",
        )?;
        c.validate()
            .map_err(|e| Error::InvalidCommit(format!("root header: {}", e)))?;
        ensure(c.is_root(), "commit root-header has a Path")?;
        ensure(c.ver() > 0, "invalid commit root-header Ver")?;
        ensure(
            c.part_size() == r.part_size(),
            "invalid commit-header Part-Size",
        )?;
        ensure(c.created().is_some(), "invalid commit-header Created")?;
        ensure(c.updated().is_some(), "invalid commit-header Updated")?;
        ensure(
            r.created().is_none() || c.created() == r.created(),
            "invalid commit-header Created",
        )?;
        ensure(c.updated() >= c.created(), "invalid commit-header Updated")?;
        ensure(version_is_greater(&c, &r), "invalid commit-header Ver")?;
        ensure(!c.deleted(), "invalid commit-header Deleted")?;
        ensure(
            c.public_key().as_ref() == Some(&self.public_key),
            "invalid commit-header Public-Key",
        )?;
        ensure(c.verify(), "invalid commit-header Signature")?;

        //--- equal versions: a tie-break replacement starts from scratch
        let mut del_files: HashSet<String> = HashSet::new();
        let cur_tree: Tree = if c.ver() == r.ver() {
            for nd in current.iter() {
                if !nd.is_dir() && nd.header.file_size() > 0 {
                    del_files.insert(nd.path.clone());
                }
            }
            Tree::empty()
        } else {
            (*current).clone()
        };

        //--- verify commit headers
        let mut updated: HashMap<String, Header> = HashMap::with_capacity(headers.len());
        let mut merged: Vec<Header> = Vec::with_capacity(headers.len() + cur_tree.len());
        for h in &headers {
            h.validate()
                .map_err(|e| Error::InvalidCommit(e.to_string()))?;
            let path = h.path().to_string();
            merged.push(h.clone());
            updated.insert(path.clone(), h.clone());

            if h.is_root() {
                ensure(h.has(header::MERKLE), "root header missing Merkle")?;
                ensure(h.has(header::VOLUME), "root header missing Volume")?;
                ensure(!h.deleted(), "root header is deleted")?;
            }

            if h.deleted() {
                // schedule content removal for the whole tombstoned subtree
                cur_tree.walk(&path, &mut |nd| {
                    if !nd.is_dir() && nd.header.file_size() > 0 {
                        del_files.insert(nd.path.clone());
                    }
                    true
                });
            } else {
                // a tombstoned path cannot come back to life
                ensure(
                    cur_tree.get(&path).map_or(true, |nd| !nd.header.deleted()),
                    "deleted node cannot be restored",
                )?;
            }
        }

        //--- merge with the current tree
        merge_current(&cur_tree, &updated, &mut merged);
        header::sort_headers(&mut merged);
        let new_tree = index_tree(merged.clone())?;

        //--- verify the signed aggregates against the rebuilt tree
        ensure(
            new_tree.subtree_volume("") == c.volume(),
            "invalid commit-header Volume",
        )?;
        ensure(
            merkle_matches(new_tree.children_merkle_root(""), c.merkle()),
            "invalid commit-header Merkle",
        )?;

        let mut dirs_ok = true;
        new_tree.walk("", &mut |nd| {
            if nd.is_dir() && !nd.is_root() && nd.header.has(header::MERKLE) {
                dirs_ok = dirs_ok
                    && merkle_matches(
                        new_tree.children_merkle_root(&nd.path),
                        nd.header.merkle(),
                    );
            }
            true
        });
        ensure(dirs_ok, "invalid commit dir-Merkle")?;

        //--- stream content into one storage transaction
        let root_part_size = c.part_size();
        let headers_json = serde_json::to_vec(&merged)?;
        self.db.execute(&self.id, &mut |tx| {
            for h in &headers {
                if !h.is_file() {
                    continue;
                }
                let size = h.file_size();
                if size == 0 && !h.has(header::MERKLE) {
                    continue;
                }
                let part_size = if h.has(header::PART_SIZE) {
                    h.part_size()
                } else {
                    root_part_size
                };
                let mut hasher = MerkleHasher::new(part_size);
                let mut limited = (&mut body).take(size);
                let mut tee = HashingReader {
                    inner: &mut limited,
                    hasher: &mut hasher,
                };
                tx.put(h.path(), size, &mut tee)?;
                ensure(hasher.written() == size, "invalid commit content length")?;
                ensure(
                    merkle_matches(hasher.root(), h.merkle()),
                    "invalid commit content Merkle",
                )?;
                del_files.remove(h.path());
            }

            for path in &del_files {
                tx.delete(path)?;
            }
            tx.put(
                DB_KEY_HEADERS,
                headers_json.len() as u64,
                &mut Cursor::new(&headers_json),
            )?;
            Ok(())
        })?;

        info!(
            ver = c.ver(),
            headers = headers.len(),
            nodes = new_tree.len(),
            "commit applied"
        );
        *guard = Arc::new(new_tree);
        Ok(())
    }

    /// Destroy the backing table. The in-memory instance is consumed.
    pub fn destroy(self) -> Result<()> {
        self.db.drop_table(&self.id).map_err(Into::into)
    }
}

fn ensure(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::InvalidCommit(msg.to_string()))
    }
}

fn merkle_matches(computed: Option<Hash>, declared: Option<&[u8]>) -> bool {
    match (computed, declared) {
        (Some(a), Some(b)) => a[..] == *b,
        (None, None) => true,
        _ => false,
    }
}

fn storage_io_err(e: StorageError) -> std::io::Error {
    match e {
        StorageError::NotFound => std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        StorageError::Io(e) => e,
        e => std::io::Error::other(e.to_string()),
    }
}

/// Carry forward current headers the commit does not touch. A commit that
/// bumps a directory's version owns that directory's child list: children
/// it does not mention are dropped.
fn merge_current(cur: &Tree, updated: &HashMap<String, Header>, merged: &mut Vec<Header>) {
    fn walk(
        cur: &Tree,
        path: &str,
        updated: &HashMap<String, Header>,
        merged: &mut Vec<Header>,
    ) {
        let Some(nd) = cur.get(path) else { return };
        let h = updated.get(path);
        if h.is_none() {
            merged.push(nd.header.clone());
        }
        if h.map_or(true, |h| !h.deleted()) {
            let dir_replaced = h.map_or(false, |h| {
                nd.is_dir() && !nd.is_root() && h.ver() > nd.header.ver()
            });
            for child in &nd.children {
                if !dir_replaced || updated.contains_key(child) {
                    walk(cur, child, updated, merged);
                }
            }
        }
    }
    walk(cur, "", updated, merged);
}

/// Tee adapter: bytes read from `inner` also feed the part hasher.
struct HashingReader<'a, R: Read> {
    inner: R,
    hasher: &'a mut MerkleHasher,
}

impl<R: Read> Read for HashingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
