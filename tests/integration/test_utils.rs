//! Shared fixtures for the integration tests
//!
//! Every test filesystem is bound to the same deterministic seed key and
//! backed by an in-memory store. The commit fixtures mirror three editing
//! rounds: an initial tree, a content update with one deletion, and the
//! removal of a whole directory.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use indifs::{make_commit, Commit, FileSystem, Header, MemSource, MemStorage, PrivateKey, Source};

pub fn test_prv() -> PrivateKey {
    PrivateKey::from_seed(b"private-key-seed")
}

pub fn new_test_fs() -> FileSystem {
    FileSystem::open(test_prv().public_key(), Arc::new(MemStorage::new())).unwrap()
}

/// Source snapshot for one editing round.
pub fn commit_source(name: &str) -> Arc<dyn Source> {
    let mut src = MemSource::new();
    match name {
        "commit1" => {
            src.insert("/A/1.txt", "A1")
                .insert("/A/2.txt", "A2-data")
                .insert("/B/2/x.txt", "XX")
                .insert("/readme.txt", "read me");
        }
        "commit2" => {
            src.insert("/A/1.txt", "A1-v2")
                .insert("/B/2/x.txt", "XX")
                .insert("/C/c.txt", "CCC")
                .insert("/readme.txt", "read me");
        }
        "commit3" => {
            src.insert("/A/1.txt", "A1-v2")
                .insert("/C/c.txt", "CCC")
                .insert("/readme.txt", "read me v3");
        }
        other => panic!("unknown commit fixture {:?}", other),
    }
    src.into_source()
}

/// Build a commit from a fixture with a strictly increasing timestamp.
pub fn make_test_commit(fs: &FileSystem, name: &str) -> Commit {
    let ts = match fs.root().updated() {
        Some(updated) => updated + Duration::seconds(1),
        None => Utc.with_ymd_and_hms(2024, 11, 5, 0, 0, 0).unwrap(),
    };
    make_commit(fs, &test_prv(), &commit_source(name), Some(ts)).unwrap()
}

/// Apply a sequence of fixture commits.
pub fn apply_commits(fs: &FileSystem, names: &[&str]) {
    for name in names {
        fs.commit(make_test_commit(fs, name)).unwrap();
    }
}

/// Full header set of a filesystem, path-sorted.
pub fn fs_headers(fs: &FileSystem) -> Vec<Header> {
    fs.headers()
}
