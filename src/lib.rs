//! Staging, commit construction and layered configuration for git
//! repositories, driven by an IDE or by the `nbgit` binary.
//!
//! Open a [`Repository`], stage paths with an
//! [`IndexBuilder`](artifacts::staging::index_builder::IndexBuilder) and
//! commit them with a
//! [`CommitBuilder`](artifacts::staging::commit_builder::CommitBuilder).
//! Configuration lives in [`ConfigStore`].

pub mod areas;
pub mod artifacts;
pub mod commands;

pub use areas::config::{ConfigPaths, ConfigStore};
pub use areas::repository::Repository;
pub use artifacts::core::{CancelFlag, CoreError, LogSink, NoProgress, ProgressSink, Result};
