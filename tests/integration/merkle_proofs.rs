//! Inclusion proofs and part hashes verified against the signed root.

use indifs::crypto::merkle::merkle_root;
use indifs::{verify_merkle_proof, Error};

use super::test_utils::*;

#[test]
fn test_proofs_for_every_node() {
    let fs = new_test_fs();
    apply_commits(&fs, &["commit1", "commit2"]);

    let root = fs.root();
    assert!(root.verify());
    let signed_merkle = root.merkle().expect("root carries Merkle").to_vec();

    for h in fs_headers(&fs) {
        if h.is_root() {
            continue;
        }
        let (item, proof) = fs.file_merkle_proof(h.path()).unwrap();
        assert_eq!(proof.len() % 33, 0, "{}", h.path());
        assert_eq!(item, h.hash());
        assert!(
            h.verify_merkle_proof(&signed_merkle, &proof),
            "proof failed for {}",
            h.path()
        );
        assert!(verify_merkle_proof(&item, &signed_merkle, &proof));

        // the proof pins this header only
        let mut wrong = item;
        wrong[0] ^= 1;
        assert!(!verify_merkle_proof(&wrong, &signed_merkle, &proof));
    }
}

#[test]
fn test_file_parts_match_headers() {
    let fs = new_test_fs();
    apply_commits(&fs, &["commit1", "commit2"]);

    for h in fs_headers(&fs) {
        if !h.is_file() || h.file_size() == 0 {
            continue;
        }
        let parts = fs.file_parts(h.path()).unwrap();
        let recomputed = merkle_root(&parts).expect("non-empty file");
        assert_eq!(
            h.merkle().unwrap(),
            &recomputed[..],
            "part hashes diverge for {}",
            h.path()
        );
    }
}

#[test]
fn test_proof_for_missing_path() {
    let fs = new_test_fs();
    apply_commits(&fs, &["commit1"]);

    assert!(matches!(
        fs.file_merkle_proof("/missing.txt"),
        Err(Error::NotFound)
    ));
    assert!(matches!(fs.file_merkle_proof(""), Err(Error::NotFound)));
    assert!(matches!(fs.file_parts("/missing.txt"), Err(Error::NotFound)));
}

#[test]
fn test_proof_survives_updates() {
    let fs = new_test_fs();
    apply_commits(&fs, &["commit1"]);
    let (_, old_proof) = fs.file_merkle_proof("/readme.txt").unwrap();
    let old_merkle = fs.root().merkle().unwrap().to_vec();

    apply_commits(&fs, &["commit2"]);
    let (item, new_proof) = fs.file_merkle_proof("/readme.txt").unwrap();
    let new_merkle = fs.root().merkle().unwrap().to_vec();

    // the new proof verifies under the new root, the old one does not
    assert!(verify_merkle_proof(&item, &new_merkle, &new_proof));
    assert_ne!(old_merkle, new_merkle);
    assert!(!verify_merkle_proof(&item, &new_merkle, &old_proof));
}
