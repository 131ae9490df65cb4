//! Logging smoke test: initialization is idempotent and instrumented
//! operations run under an installed subscriber.

use indifs::logging;

use super::test_utils::*;

#[test]
fn test_commit_under_subscriber() {
    logging::init_default();
    logging::init_default(); // second call is a no-op

    let fs = new_test_fs();
    apply_commits(&fs, &["commit1"]);
    assert_eq!(fs.root().ver(), 1);
}
