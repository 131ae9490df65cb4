//! Cross-module scenarios for the commit engine.

pub mod test_utils;

mod boundaries;
mod conflict_commits;
mod get_commit;
mod logging_default;
mod merkle_proofs;
mod sled_persistence;
