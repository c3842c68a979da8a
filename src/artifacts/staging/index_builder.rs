use crate::areas::repository::Repository;
use crate::artifacts::core::{LogSink, ProgressSink, Result};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::staging::path_set::{Change, PathSet};
use crate::artifacts::staging::{NO_PROGRESS, apply_paths, check_cancelled, store_tree};
use std::path::{Path, PathBuf};

/// Collects additions and deletions, then applies them to the index
///
/// Nothing touches the disk until [`IndexBuilder::write`].
pub struct IndexBuilder<'r> {
    repository: &'r Repository,
    paths: PathSet,
    log: Option<&'r dyn LogSink>,
    progress: &'r dyn ProgressSink,
}

impl<'r> IndexBuilder<'r> {
    pub fn new(repository: &'r Repository) -> Self {
        IndexBuilder {
            repository,
            paths: PathSet::new(),
            log: None,
            progress: &NO_PROGRESS,
        }
    }

    pub fn log(mut self, log: &'r dyn LogSink) -> Self {
        self.log = Some(log);
        self
    }

    pub fn progress(mut self, progress: &'r dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn add(mut self, path: impl Into<PathBuf>) -> Self {
        self.record(Change::Add(path.into()));
        self
    }

    pub fn add_all<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        for path in paths {
            self.record(Change::Add(path.as_ref().to_path_buf()));
        }
        self
    }

    pub fn delete(mut self, path: impl Into<PathBuf>) -> Self {
        self.record(Change::Delete(path.into()));
        self
    }

    pub fn delete_all<P: AsRef<Path>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        for path in paths {
            self.record(Change::Delete(path.as_ref().to_path_buf()));
        }
        self
    }

    pub fn move_path(mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.record(Change::Move {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    fn record(&mut self, change: Change) {
        let line = change.to_string();
        tracing::debug!(change = %line, "staged");
        if let Some(log) = self.log {
            log.log(&line);
        }

        self.paths.apply(&change);
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// Apply the pending changes and persist the index
    ///
    /// The pending set is consumed. With nothing pending the index file is
    /// not touched at all. On error or cancellation the index file on disk is
    /// left exactly as it was.
    pub async fn write(&mut self) -> Result<()> {
        let paths = std::mem::take(&mut self.paths);
        if paths.is_empty() {
            tracing::debug!("nothing staged, index left alone");
            return Ok(());
        }

        let index = self.repository.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut staged = index.clone();
        apply_paths(self.repository, &paths, &mut staged, self.progress)?;

        check_cancelled(self.progress)?;
        staged.write_updates()?;
        *index = staged;

        Ok(())
    }

    /// Build and store the trees of everything tracked in the index
    ///
    /// Returns the id of the root tree. An empty index gives the empty tree.
    pub async fn write_tree(&self) -> Result<ObjectId> {
        let index = self.repository.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let tree_oid = store_tree(self.repository.database(), index.entries())?;
        tracing::debug!(tree = %tree_oid, entries = index.len(), "tree written");

        Ok(tree_oid)
    }
}
