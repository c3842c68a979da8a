//! Error taxonomy shared by every area
//!
//! - `Io`: file system failure while reading or writing the index, objects, refs or config
//! - `InvalidCommit`: commit validation failed (empty message, missing identity)
//! - `RepositoryState`: the repository content cannot be trusted (corrupt index, bad ref)
//! - `ConfigSyntax`: a configuration file could not be parsed
//! - `InvalidPath`: a path does not belong to the working tree
//! - `Cancelled`: the caller asked the running operation to stop
//!
//! A missing configuration file is deliberately not an error: the store falls
//! back to an empty layer and logs the fact.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("repository state error: {0}")]
    RepositoryState(String),

    #[error("{}:{line}: {reason}", .path.display())]
    ConfigSyntax {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("path {} is outside the working tree", .0.display())]
    InvalidPath(PathBuf),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        CoreError::RepositoryState(reason.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(source: std::io::Error) -> Self {
        CoreError::Io {
            context: String::from("I/O failure"),
            source,
        }
    }
}

/// Attach a human readable context to raw I/O results.
pub trait IoContext<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| CoreError::Io {
            context: context(),
            source,
        })
    }
}
