//! Equal-version conflict resolution: the commit with the greater header
//! hash supersedes, the lesser one is rejected afterwards.

use indifs::{version_is_greater, Error};

use super::test_utils::*;

#[test]
fn test_conflicting_equal_version_commits() {
    // two commits with identical Ver and Updated but different signed
    // metadata, built against two fresh filesystems
    let mut commit_a = make_test_commit(&new_test_fs(), "commit1");
    let mut commit_b = make_test_commit(&new_test_fs(), "commit1");
    commit_b.headers[0].set_str("X", "x");
    commit_b.headers[0].sign(&test_prv());

    if commit_a.hash() > commit_b.hash() {
        std::mem::swap(&mut commit_a, &mut commit_b);
    }
    assert_eq!(commit_a.ver(), commit_b.ver());
    assert_eq!(commit_a.updated(), commit_b.updated());
    assert!(commit_a.hash() < commit_b.hash());
    assert!(version_is_greater(commit_b.root(), commit_a.root()));

    let fs = new_test_fs();
    fs.commit(commit_a).unwrap();

    // the greater-hash replacement at the same version is accepted
    let winner = commit_b.root().hash();
    fs.commit(commit_b).unwrap();
    assert_eq!(fs.root().ver(), 1);
    assert_eq!(fs.root().hash(), winner);

    // re-offering the lesser commit now fails
    let commit_a_again = make_test_commit(&new_test_fs(), "commit1");
    assert!(matches!(
        fs.commit(commit_a_again),
        Err(Error::InvalidCommit(_))
    ));
}

#[test]
fn test_replacement_rewrites_content() {
    let mut commit_a = make_test_commit(&new_test_fs(), "commit1");
    let mut commit_b = make_test_commit(&new_test_fs(), "commit1");
    commit_b.headers[0].set_str("X", "x");
    commit_b.headers[0].sign(&test_prv());
    if commit_a.hash() > commit_b.hash() {
        std::mem::swap(&mut commit_a, &mut commit_b);
    }

    let fs = new_test_fs();
    fs.commit(commit_a).unwrap();
    fs.commit(commit_b).unwrap();

    // content survives the truncate-and-replace cycle
    use std::io::Read;
    let mut content = String::new();
    fs.open_at("/readme.txt", 0)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "read me");
}
