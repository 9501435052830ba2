//! Architectural Enforcement
//!
//! Source-level checks that keep the concurrency model honest:
//! - no blocking sleeps in library code (workers use `tokio::time`)
//! - no nested runtimes (`block_on` inside library code)
//!
//! The checks live in this crate's integration tests and scan the core
//! crate's sources with `walkdir`.

use std::path::PathBuf;

/// Root of the core crate's sources, relative to the workspace
#[must_use]
pub fn core_src_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../client/core/src")
}
