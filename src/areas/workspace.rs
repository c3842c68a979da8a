//! Working tree access
//!
//! Paths handed to the rest of the crate are relative to the working tree
//! root. Absolute paths are accepted at the edge and rejected when they point
//! outside the tree or into `.git`.

use crate::artifacts::core::{CoreError, IoContext, Result};
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const GIT_DIR_NAME: &str = ".git";

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turn a caller supplied path into a path relative to the working tree
    ///
    /// The working tree root itself maps to the empty path.
    pub fn relativize(&self, path: &Path) -> Result<PathBuf> {
        let relative = match path.is_absolute() {
            true => self.strip_root(path)?,
            false => path.to_path_buf(),
        };

        let normalized = normalize(&relative).ok_or_else(|| CoreError::InvalidPath(path.to_path_buf()))?;
        if normalized.starts_with(GIT_DIR_NAME) {
            return Err(CoreError::InvalidPath(path.to_path_buf()));
        }

        Ok(normalized)
    }

    fn strip_root(&self, path: &Path) -> Result<PathBuf> {
        if let Some(lexical) = normalize(path)
            && let Ok(relative) = lexical.strip_prefix(&self.path)
        {
            return Ok(relative.to_path_buf());
        }

        // symlinked prefixes, e.g. a temp dir reached through /private
        std::fs::canonicalize(path)
            .ok()
            .and_then(|canonical| canonical.strip_prefix(&self.path).ok().map(Path::to_path_buf))
            .ok_or_else(|| CoreError::InvalidPath(path.to_path_buf()))
    }

    /// Expand a relative path to the files it designates
    ///
    /// A file designates itself; a directory designates every file below it,
    /// skipping nested `.git` directories. Results are sorted.
    pub fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let absolute = self.path.join(path);
        let metadata = std::fs::metadata(&absolute)
            .io_context(|| format!("cannot stat {}", absolute.display()))?;

        if !metadata.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&absolute)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != GIT_DIR_NAME);
        for entry in walker {
            let entry = entry.map_err(|error| {
                let context = format!("walking {}", absolute.display());
                match error.into_io_error() {
                    Some(source) => CoreError::Io { context, source },
                    None => CoreError::corrupt(context),
                }
            })?;

            if entry.file_type().is_dir() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.path) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn read_file(&self, file_path: &Path) -> Result<Bytes> {
        let absolute = self.path.join(file_path);

        std::fs::read(&absolute)
            .map(Bytes::from)
            .io_context(|| format!("cannot read {}", absolute.display()))
    }

    pub fn parse_blob(&self, file_path: &Path) -> Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    pub fn stat_file(&self, file_path: &Path) -> Result<EntryMetadata> {
        let absolute = self.path.join(file_path);
        let metadata = std::fs::metadata(&absolute)
            .io_context(|| format!("cannot stat {}", absolute.display()))?;

        (absolute.as_path(), metadata).try_into()
    }
}

/// Resolve `.` and `..` lexically; `None` when `..` climbs above the start
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            other => normalized.push(other),
        }
    }

    Some(normalized)
}
