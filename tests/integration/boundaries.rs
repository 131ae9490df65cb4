//! Limit behavior: path depth, partitioning edges, and skip rules the
//! builder applies to invalid source names.

use indifs::crypto::merkle::merkle_root;
use indifs::{make_commit, Error, MemSource, MerkleHasher};

use super::test_utils::*;

#[test]
fn test_six_levels_ok_seven_skipped() {
    let fs = new_test_fs();
    let mut src = MemSource::new();
    src.insert("/1/2/3/4/5/ok.txt", "deep")
        .insert("/1/2/3/4/5/6/too-deep.txt", "skip");

    let commit = make_commit(&fs, &test_prv(), &src.into_source(), None).unwrap();
    fs.commit(commit).unwrap();

    assert!(fs.file_header("/1/2/3/4/5/ok.txt").is_ok());
    // the six-level directory itself is valid, its file is one level too far
    assert!(fs.file_header("/1/2/3/4/5/6/").is_ok());
    assert!(matches!(
        fs.file_header("/1/2/3/4/5/6/too-deep.txt"),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_invalid_names_skipped() {
    let fs = new_test_fs();
    let mut src = MemSource::new();
    src.insert("/ok.txt", "fine")
        .insert("/..hidden", "skip")
        .insert("/  /x", "skip");

    let commit = make_commit(&fs, &test_prv(), &src.into_source(), None).unwrap();
    fs.commit(commit).unwrap();

    assert!(fs.file_header("/ok.txt").is_ok());
    assert!(fs.file_header("/..hidden").is_err());
    assert_eq!(fs.root().volume(), 4);
}

#[test]
fn test_unpartitioned_large_file() {
    let fs = new_test_fs(); // no Part-Size: one unbounded part
    let data: Vec<u8> = (0..=255u8).cycle().take(3000).collect();

    let mut src = MemSource::new();
    src.insert("/blob.bin", data.clone());
    let commit = make_commit(&fs, &test_prv(), &src.into_source(), None).unwrap();
    fs.commit(commit).unwrap();

    let parts = fs.file_parts("/blob.bin").unwrap();
    assert_eq!(parts.len(), 1);

    let h = fs.file_header("/blob.bin").unwrap();
    assert_eq!(h.merkle().unwrap(), &merkle_root(&parts).unwrap()[..]);
}

#[test]
fn test_partitioned_large_file() {
    let fs = new_test_fs();
    fs.set_part_size(1024);
    let data: Vec<u8> = (0..=255u8).cycle().take(3000).collect();

    let mut src = MemSource::new();
    src.insert("/blob.bin", data.clone());
    let commit = make_commit(&fs, &test_prv(), &src.into_source(), None).unwrap();
    fs.commit(commit).unwrap();

    // 1024 + 1024 + 952
    let parts = fs.file_parts("/blob.bin").unwrap();
    assert_eq!(parts.len(), 3);

    let mut w = MerkleHasher::new(1024);
    w.update(&data);
    assert_eq!(parts, w.into_leaves());

    let h = fs.file_header("/blob.bin").unwrap();
    assert_eq!(h.merkle().unwrap(), &merkle_root(&parts).unwrap()[..]);
}

#[test]
fn test_part_size_cannot_change() {
    let fs = new_test_fs();
    fs.set_part_size(1024);
    apply_commits(&fs, &["commit1"]);

    // a commit built against a different Part-Size is rejected
    let fs2 = new_test_fs();
    fs2.set_part_size(2048);
    let commit = make_test_commit(&fs2, "commit1");
    assert!(matches!(fs.commit(commit), Err(Error::InvalidCommit(_))));
}
