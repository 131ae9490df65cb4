//! Read-only source views for commit construction
//!
//! The builder walks a snapshot of "what the filesystem should now contain"
//! through this trait. Paths use the logical form: leading `/`, trailing `/`
//! on directories, the root directory being `/`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// One directory entry of a source view.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Read-only snapshot of a file tree.
pub trait Source: Send + Sync {
    /// Open a file for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    /// List a directory. `path` ends with `/`.
    fn read_dir(&self, path: &str) -> io::Result<Vec<SourceEntry>>;
}

/// In-memory source: a map from file path to content. Directories are
/// implied by the paths of the files inside them; empty directories can be
/// declared explicitly.
#[derive(Debug, Clone, Default)]
pub struct MemSource {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl MemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(path.to_string(), content.into());
        self
    }

    /// Declare a directory that exists even without files, e.g. `/d/`.
    pub fn insert_dir(&mut self, path: &str) -> &mut Self {
        self.dirs.insert(path.to_string());
        self
    }

    pub fn remove(&mut self, path: &str) -> &mut Self {
        self.files.remove(path);
        self
    }

    pub fn into_source(self) -> Arc<dyn Source> {
        Arc::new(self)
    }
}

impl Source for MemSource {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        match self.files.get(path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, path.to_string())),
        }
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<SourceEntry>> {
        let mut entries: Vec<SourceEntry> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let keys = self
            .files
            .keys()
            .map(|f| (f.as_str(), false))
            .chain(self.dirs.iter().map(|d| (d.as_str(), true)));
        for (key, key_is_dir) in keys {
            let Some(rest) = key.strip_prefix(path) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let (name, is_dir) = match rest.find('/') {
                Some(i) => (&rest[..i], true),
                None => (rest, key_is_dir),
            };
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_string()) {
                entries.push(SourceEntry {
                    name: name.to_string(),
                    is_dir,
                });
            }
        }
        Ok(entries)
    }
}

/// Source view over an on-disk directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_matches('/'))
    }
}

impl Source for DirSource {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(self.resolve(path))?))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<SourceEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                // skip names that are not valid UTF-8
                continue;
            };
            entries.push(SourceEntry {
                is_dir: entry.file_type()?.is_dir(),
                name,
            });
        }
        Ok(entries)
    }
}
