//! Differential commit extraction and replica round trips.

use super::test_utils::*;

#[test]
fn test_get_commit_behind_returns_none() {
    let fs = new_test_fs();
    assert!(fs.get_commit(0).unwrap().is_none());

    apply_commits(&fs, &["commit1"]);
    assert!(fs.get_commit(1).unwrap().is_none());
    assert!(fs.get_commit(7).unwrap().is_none());
    assert!(fs.get_commit(0).unwrap().is_some());
}

#[test]
fn test_differential_round_trip() {
    let source = new_test_fs();
    apply_commits(&source, &["commit1", "commit2", "commit3"]);

    let replica = new_test_fs();
    apply_commits(&replica, &["commit1"]);

    let diff = source
        .get_commit(replica.root().ver())
        .unwrap()
        .expect("source is ahead");
    assert!(diff.headers.len() > 1);
    assert_eq!(diff.ver(), 3);

    replica.commit(diff).unwrap();
    assert_eq!(fs_headers(&source), fs_headers(&replica));

    // replicated content is byte-identical
    use std::io::Read;
    for h in fs_headers(&replica) {
        if h.is_file() && h.file_size() > 0 {
            let mut a = Vec::new();
            let mut b = Vec::new();
            source.open_at(h.path(), 0).unwrap().read_to_end(&mut a).unwrap();
            replica.open_at(h.path(), 0).unwrap().read_to_end(&mut b).unwrap();
            assert_eq!(a, b, "{}", h.path());
        }
    }
}

#[test]
fn test_full_round_trip_from_zero() {
    let source = new_test_fs();
    apply_commits(&source, &["commit1", "commit2", "commit3"]);

    let replica = new_test_fs();
    apply_commits(&replica, &["commit1"]);

    let full = source.get_commit(0).unwrap().expect("non-empty");
    assert_eq!(full.ver(), 3);

    replica.commit(full).unwrap();
    assert_eq!(fs_headers(&source), fs_headers(&replica));
}

#[test]
fn test_get_commit_headers_are_sorted_and_rooted() {
    let fs = new_test_fs();
    apply_commits(&fs, &["commit1", "commit2"]);

    let commit = fs.get_commit(0).unwrap().unwrap();
    assert!(commit.root().is_root());
    for pair in commit.headers.windows(2) {
        assert!(
            indifs::path::path_less(pair[0].path(), pair[1].path()),
            "{:?} !< {:?}",
            pair[0].path(),
            pair[1].path()
        );
    }
}
