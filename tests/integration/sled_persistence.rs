//! Durable backend: header set and content survive a process restart.

use std::io::Read;
use std::sync::Arc;

use tempfile::TempDir;

use indifs::{Error, FileSystem, SledStorage, Storage};

use super::test_utils::*;

#[test]
fn test_reopen_restores_state() {
    let dir = TempDir::new().unwrap();
    let pub_key = test_prv().public_key();

    let root_hash = {
        let db: Arc<dyn Storage> = Arc::new(SledStorage::open(dir.path()).unwrap());
        let fs = FileSystem::open(pub_key.clone(), db).unwrap();
        apply_commits(&fs, &["commit1", "commit2"]);
        fs.root().hash()
    };

    let db: Arc<dyn Storage> = Arc::new(SledStorage::open(dir.path()).unwrap());
    let fs = FileSystem::open(pub_key, db).unwrap();

    assert_eq!(fs.root().hash(), root_hash);
    assert_eq!(fs.root().ver(), 2);
    assert!(fs.root().verify());

    let mut content = String::new();
    fs.open_at("/C/c.txt", 0)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "CCC");

    // proofs keep working over the reloaded tree
    let (item, proof) = fs.file_merkle_proof("/C/c.txt").unwrap();
    assert!(indifs::verify_merkle_proof(
        &item,
        fs.root().merkle().unwrap(),
        &proof
    ));
}

#[test]
fn test_destroy_clears_table() {
    let dir = TempDir::new().unwrap();
    let pub_key = test_prv().public_key();
    let db: Arc<dyn Storage> = Arc::new(SledStorage::open(dir.path()).unwrap());

    let fs = FileSystem::open(pub_key.clone(), Arc::clone(&db)).unwrap();
    apply_commits(&fs, &["commit1"]);
    fs.destroy().unwrap();

    let fs = FileSystem::open(pub_key, db).unwrap();
    assert_eq!(fs.root().ver(), 0);
    assert!(matches!(fs.open_at("/readme.txt", 0), Err(Error::NotFound)));
}
