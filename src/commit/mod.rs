//! Commit construction
//!
//! A commit is an ordered header list plus a body stream: the concatenated
//! content of every included file. `make_commit` diffs a source view
//! against the current tree, emitting headers only for new, changed, or
//! deleted paths, tombstones for everything that vanished, and a signed
//! root header over the resulting merkle state.

pub mod source;

pub use source::{DirSource, MemSource, Source, SourceEntry};

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::crypto::merkle::{Hash, MerkleHasher};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::header::{self, Header};
use crate::multi_reader::MultiReader;
use crate::path::{is_valid_path, is_valid_path_name, path_cmp, MAX_PATH_DIR_FILES_COUNT};
use crate::tree::index_tree;

/// An atomic signed set of header changes plus concatenated file content.
pub struct Commit {
    /// Path-sorted headers; the signed root header comes first.
    pub headers: Vec<Header>,
    /// Concatenated content of every included file with `Size > 0`, in
    /// header order.
    pub body: Box<dyn Read + Send>,
}

impl Commit {
    /// The commit's candidate root header.
    ///
    /// A commit produced by this crate always carries at least the root;
    /// a hand-built empty commit panics here and is rejected by the
    /// applier before any accessor runs.
    pub fn root(&self) -> &Header {
        &self.headers[0]
    }

    pub fn author(&self) -> Option<PublicKey> {
        self.root().public_key()
    }

    pub fn ver(&self) -> u64 {
        self.root().ver()
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.root().updated()
    }

    pub fn hash(&self) -> Hash {
        self.root().hash()
    }

    /// Total body length declared by the headers.
    pub fn body_size(&self) -> u64 {
        self.headers.iter().map(|h| h.file_size()).sum()
    }
}

impl std::fmt::Debug for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commit")
            .field("ver", &self.ver())
            .field("headers", &self.headers.len())
            .field("body_size", &self.body_size())
            .finish()
    }
}

/// Build a signed commit that moves `fs` to the state of `src`.
///
/// `ts` is the commit time; `None` means now. The timestamp is bumped past
/// the current root's `Updated` to keep versions strictly ordered in time.
#[instrument(skip_all, fields(fs = %fs.id()))]
pub fn make_commit(
    fs: &FileSystem,
    prv: &PrivateKey,
    src: &Arc<dyn Source>,
    ts: Option<DateTime<Utc>>,
) -> Result<Commit> {
    let root = fs.root();
    let ver = root.ver() + 1;
    let part_size = root.part_size();

    let mut ts = ts.unwrap_or_else(Utc::now);
    if let Some(updated) = root.updated() {
        if ts.timestamp() <= updated.timestamp() {
            ts = updated + Duration::seconds(1);
        }
    }

    let mut b = Builder {
        fs,
        src: Arc::clone(src),
        ver,
        part_size,
        commit_headers: vec![root.clone()],
        new_headers: vec![root.clone()],
        body: MultiReader::new(),
        on_disk: HashSet::from([String::new(), "/".to_string()]),
        in_commit: HashSet::from([String::new()]),
    };

    b.walk_source("/")?;
    b.walk_current(&root)?;

    let Builder {
        mut commit_headers,
        mut new_headers,
        body,
        ..
    } = b;

    header::sort_headers(&mut commit_headers);
    header::sort_headers(&mut new_headers);

    // rebuild the hypothetical tree to derive the signed aggregates
    let new_tree = index_tree(new_headers)?;
    let volume = new_tree.subtree_volume("");
    let merkle = new_tree.children_merkle_root("");

    let root_header = &mut commit_headers[0];
    if root_header.created().is_none() {
        root_header.set_time(header::CREATED, ts);
    }
    root_header.set_time(header::UPDATED, ts);
    root_header.set_u64(header::VER, ver);
    root_header.set_u64(header::VOLUME, volume);
    match merkle {
        Some(m) => root_header.set_bytes(header::MERKLE, &m),
        None => root_header.remove(header::MERKLE),
    }
    root_header.sign(prv);

    debug!(
        ver,
        headers = commit_headers.len(),
        volume,
        "commit built"
    );
    Ok(Commit {
        headers: commit_headers,
        body: Box::new(body),
    })
}

struct Builder<'a> {
    fs: &'a FileSystem,
    src: Arc<dyn Source>,
    ver: u64,
    part_size: u64,
    /// Headers shipped in the commit: changed, new, and tombstoned paths.
    commit_headers: Vec<Header>,
    /// Full header set of the hypothetical next version.
    new_headers: Vec<Header>,
    body: MultiReader,
    on_disk: HashSet<String>,
    in_commit: HashSet<String>,
}

impl Builder<'_> {
    /// Depth-first walk of the source view in deterministic path order.
    fn walk_source(&mut self, path: &str) -> Result<()> {
        if !is_valid_path(path) {
            return Ok(());
        }
        let is_dir = path.ends_with('/');
        let existing = match self.fs.file_header(path) {
            Ok(h) => Some(h),
            Err(Error::NotFound) => None,
            Err(e) => return Err(e),
        };
        let exists = existing.is_some();
        let mut h = existing.unwrap_or_else(|| Header::with_path(path));
        self.on_disk.insert(path.to_string());

        let mut file_size = 0u64;
        let mut file_merkle: Option<Hash> = None;
        if !is_dir {
            (file_size, file_merkle) = self.source_file_merkle(path)?;
        }

        let changed = !exists
            || (!is_dir && h.merkle() != file_merkle.as_ref().map(|m| &m[..]));
        if changed {
            h.set_u64(header::VER, self.ver);
            if !is_dir {
                h.set_u64(header::SIZE, file_size);
                match file_merkle {
                    Some(m) => h.set_bytes(header::MERKLE, &m),
                    None => h.remove(header::MERKLE),
                }
                let src = Arc::clone(&self.src);
                let p = path.to_string();
                self.body.add(Box::new(move || src.open(&p)));
            }
            self.commit_headers.push(h.clone());
            self.in_commit.insert(path.to_string());
            self.new_headers.push(h);
        }

        if is_dir {
            let mut entries = self.src.read_dir(path)?;
            entries.retain(|e| is_valid_path_name(&e.name));
            if entries.len() > MAX_PATH_DIR_FILES_COUNT {
                return Err(Error::TooManyFiles);
            }
            entries.sort_by(|a, b| path_cmp(&a.name, &b.name));
            for e in entries {
                let child = if e.is_dir {
                    format!("{}{}/", path, e.name)
                } else {
                    format!("{}{}", path, e.name)
                };
                self.walk_source(&child)?;
            }
        }
        Ok(())
    }

    /// Stream a source file through the part hasher.
    fn source_file_merkle(&self, path: &str) -> Result<(u64, Option<Hash>)> {
        let mut r = self.src.open(path)?;
        let mut w = MerkleHasher::new(self.part_size);
        std::io::copy(&mut r, &mut w)?;
        Ok((w.written(), w.root()))
    }

    /// Walk the current tree: tombstone what vanished from the source and
    /// carry forward everything untouched.
    fn walk_current(&mut self, h: &Header) -> Result<()> {
        let path = h.path().to_string();
        if !self.on_disk.contains(&path) {
            let mut tomb = Header::with_path(&path);
            tomb.set_u64(header::VER, self.ver);
            tomb.set_u64(header::DELETED, 1);
            self.new_headers.push(tomb.clone());
            self.commit_headers.push(tomb);
            // children are implicitly gone with their parent
            return Ok(());
        }
        if !self.in_commit.contains(&path) {
            self.new_headers.push(h.clone());
        }
        let children = match self.fs.read_dir(&path) {
            Ok(hh) => hh,
            Err(Error::NotFound) => Vec::new(),
            Err(e) => return Err(e),
        };
        for child in &children {
            self.walk_current(child)?;
        }
        Ok(())
    }
}
