//! Staging and commit construction
//!
//! - `path_set`: pending additions and deletions of one operation
//! - `index_builder`: applies a path set to the index and builds trees
//! - `commit_builder`: turns the staged tree into a commit on the current branch
//!
//! Builders are obtained from a [`Repository`] and consumed by their `write`.
//! Both report to a [`ProgressSink`] and stop cleanly when it is cancelled.

pub mod commit_builder;
pub mod index_builder;
pub mod path_set;

use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::core::{CoreError, NoProgress, ProgressSink, Result};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use path_set::PathSet;
use std::path::PathBuf;

/// Progress sink used when the caller does not attach one
pub(crate) static NO_PROGRESS: NoProgress = NoProgress;

/// Calls `end()` however the operation exits
struct ProgressScope<'p>(&'p dyn ProgressSink);

impl<'p> ProgressScope<'p> {
    fn start(progress: &'p dyn ProgressSink, total: usize) -> Self {
        progress.start(total);
        ProgressScope(progress)
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        self.0.end();
    }
}

pub(crate) fn check_cancelled(progress: &dyn ProgressSink) -> Result<()> {
    match progress.is_cancelled() {
        true => Err(CoreError::Cancelled),
        false => Ok(()),
    }
}

/// Apply `paths` to the in-memory `index`
///
/// Every path is resolved against the working tree before the index is
/// touched, so an invalid or missing path leaves `index` as it was. Deletions
/// run before additions, which lets a directory be replaced by a file of the
/// same name within one operation.
pub(crate) fn apply_paths(
    repository: &Repository,
    paths: &PathSet,
    index: &mut Index,
    progress: &dyn ProgressSink,
) -> Result<()> {
    let workspace = repository.workspace();

    let to_delete = paths
        .to_delete()
        .iter()
        .map(|path| workspace.relativize(path))
        .collect::<Result<Vec<_>>>()?;
    let to_add = paths
        .to_add()
        .iter()
        .map(|path| workspace.list_files(&workspace.relativize(path)?))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<PathBuf>>();

    let _scope = ProgressScope::start(progress, to_delete.len() + to_add.len());
    let mut completed = 0;

    for path in &to_delete {
        check_cancelled(progress)?;

        for tracked in index.entries_under_path(path) {
            index.remove(&tracked);
        }

        completed += 1;
        progress.update(completed);
    }

    for path in to_add {
        check_cancelled(progress)?;

        let blob = workspace.parse_blob(&path)?;
        let blob_id = repository.database().store(&blob)?;
        let metadata = workspace.stat_file(&path)?;

        // new entries never trust their cached stat data
        index.add(IndexEntry::new(path, blob_id, metadata));

        completed += 1;
        progress.update(completed);
    }

    Ok(())
}

/// Store every tree built from `entries`, subtrees first; returns the root id
pub(crate) fn store_tree<'e>(
    database: &Database,
    entries: impl Iterator<Item = &'e IndexEntry>,
) -> Result<ObjectId> {
    let tree = Tree::build(entries)?;
    tree.traverse(&mut |subtree: &Tree| database.store(subtree).map(|_| ()))?;

    tree.object_id()
}
