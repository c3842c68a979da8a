//! Pending changes of a single staging operation
//!
//! A rename is recorded as a delete of the old path plus an add of the new
//! one; no rename marker survives into the index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One registration call, as shown in the staging log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Add(PathBuf),
    Delete(PathBuf),
    Move { from: PathBuf, to: PathBuf },
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Add(path) => write!(f, "A {}", path.display()),
            Change::Delete(path) => write!(f, "D {}", path.display()),
            Change::Move { from, to } => write!(f, "R {} -> {}", from.display(), to.display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet {
    to_add: BTreeSet<PathBuf>,
    to_delete: BTreeSet<PathBuf>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `change`; the latest call wins for every path it names
    pub fn apply(&mut self, change: &Change) {
        match change {
            Change::Add(path) => self.add(path),
            Change::Delete(path) => self.delete(path),
            Change::Move { from, to } => {
                self.delete(from);
                self.add(to);
            }
        }
    }

    fn add(&mut self, path: &Path) {
        self.to_delete.remove(path);
        self.to_add.insert(path.to_path_buf());
    }

    fn delete(&mut self, path: &Path) {
        self.to_add.remove(path);
        self.to_delete.insert(path.to_path_buf());
    }

    pub fn to_add(&self) -> &BTreeSet<PathBuf> {
        &self.to_add
    }

    pub fn to_delete(&self) -> &BTreeSet<PathBuf> {
        &self.to_delete
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_delete.len()
    }
}
