//! Path-indexed header tree
//!
//! The in-memory view of one filesystem version: every header keyed by its
//! path, children resolved through `dirname`, and merkle/volume aggregates
//! recomputed over the structure. The tree is rebuilt from a sorted header
//! list on every applied commit and swapped in whole.

use std::collections::HashMap;

use crate::crypto::merkle::{
    append_merkle_proof, hash_pair, make_merkle_proof, make_merkle_root, Hash, OP_LHASH, OP_RHASH,
};
use crate::error::Error;
use crate::header::Header;
use crate::path::{dirname, is_dir_path};

/// One node: a header bound to its path and its immediate children.
#[derive(Debug, Clone)]
pub struct Node {
    pub header: Header,
    pub path: String,
    /// Child paths in header order (path-sorted at build time).
    pub children: Vec<String>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_dir(&self) -> bool {
        is_dir_path(&self.path)
    }
}

/// Indexed tree over one sorted header list. The root node lives at the
/// empty path.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<String, Node>,
}

/// Build the index from a path-sorted header list. The first header must be
/// the root; every other header needs a live parent already in the list.
pub fn index_tree(headers: Vec<Header>) -> Result<Tree, Error> {
    let mut iter = headers.into_iter();
    let root = iter
        .next()
        .filter(|h| h.is_root())
        .ok_or_else(|| Error::InvalidCommit("missing root header".into()))?;

    let mut nodes = HashMap::new();
    nodes.insert(
        String::new(),
        Node {
            header: root,
            path: String::new(),
            children: Vec::new(),
        },
    );

    for h in iter {
        let path = h.path().to_string();
        if nodes.contains_key(&path) {
            return Err(Error::InvalidCommit(format!(
                "several nodes with the same path {:?}",
                path
            )));
        }
        let parent = dirname(&path).to_string();
        match nodes.get_mut(&parent) {
            None => {
                return Err(Error::InvalidCommit(format!(
                    "parent dir of {:?} not found",
                    path
                )))
            }
            Some(p) if p.header.deleted() => {
                return Err(Error::InvalidCommit(format!(
                    "parent dir of {:?} is deleted",
                    path
                )))
            }
            Some(p) => p.children.push(path.clone()),
        }
        nodes.insert(
            path.clone(),
            Node {
                header: h,
                path,
                children: Vec::new(),
            },
        );
    }
    Ok(Tree { nodes })
}

impl Tree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// The root node; only an empty tree has none.
    pub fn root(&self) -> Option<&Node> {
        self.nodes.get("")
    }

    pub fn root_mut(&mut self) -> Option<&mut Node> {
        self.nodes.get_mut("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All headers sorted by path.
    pub fn headers(&self) -> Vec<Header> {
        let mut hh: Vec<Header> = self.nodes.values().map(|n| n.header.clone()).collect();
        crate::header::sort_headers(&mut hh);
        hh
    }

    /// Pre-order walk from `path`; `f` returns whether to descend.
    pub fn walk(&self, path: &str, f: &mut dyn FnMut(&Node) -> bool) {
        if let Some(nd) = self.nodes.get(path) {
            self.walk_node(nd, f);
        }
    }

    fn walk_node(&self, nd: &Node, f: &mut dyn FnMut(&Node) -> bool) {
        if f(nd) {
            for child in &nd.children {
                if let Some(c) = self.nodes.get(child) {
                    self.walk_node(c, f);
                }
            }
        }
    }

    /// Sum of `Size` over every non-root node at or below `path`.
    pub fn subtree_volume(&self, path: &str) -> u64 {
        let mut total = 0u64;
        self.walk(path, &mut |nd| {
            if !nd.is_root() {
                total += nd.header.file_size();
            }
            true
        });
        total
    }

    /// Merkle value a node contributes to its parent: the header hash alone
    /// for leaves, or `H(headerHash ‖ childrenRoot)` for inner nodes.
    pub fn merkle_root(&self, path: &str) -> Option<Hash> {
        let nd = self.nodes.get(path)?;
        let node_hash = nd.header.hash();
        match self.children_merkle_root(path) {
            None => Some(node_hash),
            Some(children_root) => Some(hash_pair(&node_hash, &children_root)),
        }
    }

    /// Merkle reduction over the node's children. The root header's signed
    /// `Merkle` field equals this value for the root node.
    pub fn children_merkle_root(&self, path: &str) -> Option<Hash> {
        let nd = self.nodes.get(path)?;
        make_merkle_root(nd.children.len(), &|i| {
            self.merkle_root(&nd.children[i]).unwrap_or_default()
        })
    }

    /// Header hash of `path` plus the proof records that connect it to the
    /// root's children-merkle-root. `None` for unknown paths and the root
    /// itself (the root header is what the proof is verified against).
    pub fn file_merkle_proof(&self, path: &str) -> Option<(Hash, Vec<u8>)> {
        if path.is_empty() {
            return None;
        }
        let target = self.nodes.get(path)?;
        let root = self.root()?;
        let proof = self.children_proof(root, path)?;
        Some((target.header.hash(), proof))
    }

    fn node_proof(&self, nd: &Node, target: &str) -> Option<Vec<u8>> {
        if nd.path == target {
            let mut proof = Vec::new();
            if let Some(children_root) = self.children_merkle_root(&nd.path) {
                append_merkle_proof(&mut proof, OP_RHASH, &children_root);
            }
            return Some(proof);
        }
        let mut proof = self.children_proof(nd, target)?;
        append_merkle_proof(&mut proof, OP_LHASH, &nd.header.hash());
        Some(proof)
    }

    fn children_proof(&self, nd: &Node, target: &str) -> Option<Vec<u8>> {
        let idx = nd
            .children
            .iter()
            .position(|c| covers(c, target))?;
        let hashes: Vec<Hash> = nd
            .children
            .iter()
            .map(|c| self.merkle_root(c).unwrap_or_default())
            .collect();

        let child = self.nodes.get(&nd.children[idx])?;
        let mut proof = self.node_proof(child, target)?;
        proof.extend(make_merkle_proof(&hashes, idx).ok()?);
        Some(proof)
    }
}

/// Whether `target` lies at or below the node at `node_path`.
fn covers(node_path: &str, target: &str) -> bool {
    node_path == target || (is_dir_path(node_path) && target.starts_with(node_path))
}
