//! Commit construction
//!
//! Validation and branch tip resolution happen before anything is written.
//! Objects are then stored leaves first (blobs, trees, commit), and only
//! after a final cancellation check are the index and the branch ref
//! replaced, so a ref never points at a missing object and an aborted commit
//! leaves both files byte-identical.

use crate::areas::refs::SymRefName;
use crate::areas::repository::Repository;
use crate::artifacts::core::{CoreError, LogSink, ProgressSink, Result};
use crate::artifacts::objects::commit::{Commit, Identity};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::staging::path_set::{Change, PathSet};
use crate::artifacts::staging::{NO_PROGRESS, apply_paths, check_cancelled, store_tree};
use std::path::{Path, PathBuf};

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub oid: ObjectId,
    pub tree_oid: ObjectId,
    pub parents: Vec<ObjectId>,
    /// Reference that now points at `oid`, e.g. `refs/heads/master`
    pub reference: SymRefName,
    pub short_message: String,
}

impl CommitSummary {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

impl std::fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root = match self.is_root() {
            true => "(root-commit) ",
            false => "",
        };

        write!(
            f,
            "[{} {}{}] {}",
            self.reference.short_name(),
            root,
            self.oid.to_short_oid(),
            self.short_message
        )
    }
}

pub struct CommitBuilder<'r> {
    repository: &'r Repository,
    paths: PathSet,
    message: Option<String>,
    time: Option<(i64, i32)>,
    author: Option<Identity>,
    committer: Option<Identity>,
    log: Option<&'r dyn LogSink>,
    progress: &'r dyn ProgressSink,
}

impl<'r> CommitBuilder<'r> {
    pub fn new(repository: &'r Repository) -> Self {
        CommitBuilder {
            repository,
            paths: PathSet::new(),
            message: None,
            time: None,
            author: None,
            committer: None,
            log: None,
            progress: &NO_PROGRESS,
        }
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

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Stamp author and committer with `seconds` since the epoch at
    /// `offset_minutes` east of UTC
    pub fn time(mut self, seconds: i64, offset_minutes: i32) -> Self {
        self.time = Some((seconds, offset_minutes));
        self
    }

    pub fn author(mut self, author: Identity) -> Self {
        self.author = Some(author);
        self
    }

    /// Defaults to the author
    pub fn committer(mut self, committer: Identity) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn log(mut self, log: &'r dyn LogSink) -> Self {
        self.log = Some(log);
        self
    }

    pub fn progress(mut self, progress: &'r dyn ProgressSink) -> Self {
        self.progress = progress;
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

    /// Stage the pending changes, write the commit and advance the branch
    pub async fn write(self) -> Result<CommitSummary> {
        let (message, author, committer) = self.validate()?;
        let parents = self.resolve_parents()?;

        let index = self.repository.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut staged = index.clone();
        apply_paths(self.repository, &self.paths, &mut staged, self.progress)?;
        check_cancelled(self.progress)?;

        let tree_oid = store_tree(self.repository.database(), staged.entries())?;
        let commit = Commit::new(parents, tree_oid, author, committer, message);
        let oid = self.repository.database().store(&commit)?;

        check_cancelled(self.progress)?;
        if staged.is_changed() {
            staged.write_updates()?;
            *index = staged;
        }

        self.advance(oid, commit)
    }

    /// Write a commit for a tree that is already stored
    ///
    /// The index is not consulted; pending paths are ignored.
    pub async fn write_tree_commit(self, tree_oid: ObjectId) -> Result<CommitSummary> {
        let (message, author, committer) = self.validate()?;
        let parents = self.resolve_parents()?;

        self.repository.database().parse_object_as_tree(&tree_oid)?;

        let commit = Commit::new(parents, tree_oid, author, committer, message);
        let oid = self.repository.database().store(&commit)?;

        check_cancelled(self.progress)?;
        self.advance(oid, commit)
    }

    fn advance(&self, oid: ObjectId, commit: Commit) -> Result<CommitSummary> {
        let reference = self.repository.refs().update_head(&oid)?;

        let summary = CommitSummary {
            oid,
            tree_oid: commit.tree_oid().clone(),
            parents: commit.parents().to_vec(),
            reference,
            short_message: commit.short_message().to_string(),
        };
        tracing::info!(
            commit = %summary.oid,
            tree = %summary.tree_oid,
            reference = %summary.reference,
            root = summary.is_root(),
            "commit created"
        );

        Ok(summary)
    }

    /// Message and identities, checked before anything is written
    fn validate(&self) -> Result<(String, Identity, Identity)> {
        let message = self.message.as_deref().map(str::trim).unwrap_or_default();
        if message.is_empty() {
            return Err(CoreError::InvalidCommit(String::from("empty commit message")));
        }

        let author = match &self.author {
            Some(author) => author.clone(),
            None => {
                let mut config = self.repository.config_mut();
                Identity::new(config.user_name(false)?, config.email(false)?)
            }
        };
        let committer = self.committer.clone().unwrap_or_else(|| author.clone());

        let (author, committer) = match self.time {
            Some((seconds, offset_minutes)) => {
                let timestamp = Identity::timestamp_from_epoch(seconds, offset_minutes)?;
                (author.with_timestamp(timestamp), committer.with_timestamp(timestamp))
            }
            None => (author, committer),
        };

        if !author.is_complete() {
            return Err(CoreError::InvalidCommit(String::from(
                "author name and email must be set (user.name, user.email)",
            )));
        }
        if !committer.is_complete() {
            return Err(CoreError::InvalidCommit(String::from(
                "committer name and email must be set",
            )));
        }
        for (role, identity) in [("author", &author), ("committer", &committer)] {
            if !identity.is_well_formed() {
                return Err(CoreError::InvalidCommit(format!(
                    "{role} {:?} contains '<', '>', a line break or surrounding spaces",
                    identity.display_name()
                )));
            }
        }

        Ok((format!("{message}\n"), author, committer))
    }

    /// The current branch tip as the single parent, or none before the
    /// first commit
    fn resolve_parents(&self) -> Result<Vec<ObjectId>> {
        let unreadable = |error: CoreError| match error {
            CoreError::Io { context, source } => {
                CoreError::RepositoryState(format!("branch tip unreadable: {context}: {source}"))
            }
            other => other,
        };

        match self.repository.refs().read_head().map_err(unreadable)? {
            None => Ok(Vec::new()),
            Some(tip) => {
                self.repository
                    .database()
                    .parse_object_as_commit(&tip)
                    .map_err(unreadable)?;

                Ok(vec![tip])
            }
        }
    }
}
