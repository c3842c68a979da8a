//! `<file>.lock` based atomic replacement
//!
//! The new content is written to a sibling `.lock` file which is then renamed
//! over the target. A lock file that is dropped without `commit` is removed,
//! so the target is either fully replaced or untouched.

use crate::artifacts::core::error::{CoreError, IoContext, Result};
use file_guard::Lock;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Lockfile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl Lockfile {
    /// Create `<target>.lock`, failing if another writer holds it
    pub fn acquire(target: &Path) -> Result<Self> {
        let mut lock_name = target.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = target.with_file_name(lock_name);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("creating directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AlreadyExists => CoreError::RepositoryState(format!(
                    "unable to create {}: another writer holds the lock",
                    lock_path.display()
                )),
                _ => CoreError::Io {
                    context: format!("creating {}", lock_path.display()),
                    source,
                },
            })?;

        Ok(Self {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let lock_path = &self.lock_path;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CoreError::corrupt(format!("{} is already closed", lock_path.display())))?;

        let mut guard = file_guard::lock(file, Lock::Exclusive, 0, 1)
            .io_context(|| format!("locking {}", lock_path.display()))?;
        guard
            .deref_mut()
            .write_all(bytes)
            .io_context(|| format!("writing {}", lock_path.display()))
    }

    /// Flush the lock file and rename it over the target
    pub fn commit(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .io_context(|| format!("flushing {}", self.lock_path.display()))?;
        }

        std::fs::rename(&self.lock_path, &self.target)
            .io_context(|| format!("renaming {} into place", self.lock_path.display()))?;
        self.committed = true;

        Ok(())
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
