//! Command implementations
//!
//! Commands are `impl Repository` blocks, organized the way git splits them:
//!
//! - `plumbing`: direct object access (cat-file, hash-object, write-tree)
//! - `porcelain`: the staging, commit and configuration workflows
//!
//! Commands write their human readable output to the repository writer and
//! return `anyhow` errors for the binary to report.

pub mod plumbing;
pub mod porcelain;
