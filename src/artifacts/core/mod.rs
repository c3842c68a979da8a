//! Shared error and capability types
//!
//! - `error`: the error taxonomy and `Result` alias used by every area
//! - `lockfile`: atomic replacement of index, ref and config files
//! - `progress`: progress, cancellation and logging capabilities supplied by callers

pub mod error;
pub mod lockfile;
pub mod progress;

pub use error::{CoreError, IoContext, Result};
pub use lockfile::Lockfile;
pub use progress::{CancelFlag, LogSink, NoProgress, ProgressSink};
