use crate::areas::config::{ConfigPaths, ConfigStore};
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::{CoreError, IoContext, LogSink, Result};
use crate::artifacts::staging::commit_builder::CommitBuilder;
use crate::artifacts::staging::index_builder::IndexBuilder;
use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const GIT_DIR_NAME: &str = ".git";

/// Open handle on a working tree and its `.git` directory
pub struct Repository {
    path: Box<Path>,
    git_dir: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: RefCell<ConfigStore>,
}

impl Repository {
    /// Handle on `path` whether or not a repository exists there yet
    ///
    /// The directory is created when missing. Used by `init`; everything else
    /// goes through [`Repository::open`].
    pub fn new(path: &Path, writer: Box<dyn std::io::Write>, config_paths: &ConfigPaths) -> Result<Self> {
        std::fs::create_dir_all(path).io_context(|| format!("creating {}", path.display()))?;
        let path = path
            .canonicalize()
            .io_context(|| format!("resolving {}", path.display()))?;
        let git_dir = path.join(GIT_DIR_NAME);

        let index = Index::new(git_dir.join("index").into_boxed_path());
        let database = Database::new(git_dir.join("objects").into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(git_dir.clone().into_boxed_path());
        let config = ConfigStore::for_repository(&git_dir, config_paths)?;

        Ok(Repository {
            path: path.into_boxed_path(),
            git_dir: git_dir.into_boxed_path(),
            writer: RefCell::new(writer),
            index: Arc::new(Mutex::new(index)),
            database,
            workspace,
            refs,
            config: RefCell::new(config),
        })
    }

    /// Open the repository whose working tree is `path`
    pub fn open(path: &Path, writer: Box<dyn std::io::Write>) -> Result<Self> {
        Self::open_with(path, writer, &ConfigPaths::default())
    }

    /// Like [`Repository::open`] with explicit user and system config files
    pub fn open_with(path: &Path, writer: Box<dyn std::io::Write>, config_paths: &ConfigPaths) -> Result<Self> {
        if !path.join(GIT_DIR_NAME).is_dir() {
            return Err(CoreError::RepositoryState(format!(
                "not a git repository: {}",
                path.display()
            )));
        }

        Self::new(path, writer, config_paths)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    /// The writer as a staging log; lines are dropped while it is borrowed
    pub fn log_sink(&self) -> &dyn LogSink {
        &self.writer
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> Ref<'_, ConfigStore> {
        self.config.borrow()
    }

    pub fn config_mut(&self) -> RefMut<'_, ConfigStore> {
        self.config.borrow_mut()
    }

    pub fn index_builder(&self) -> IndexBuilder<'_> {
        IndexBuilder::new(self)
    }

    pub fn commit_builder(&self) -> CommitBuilder<'_> {
        CommitBuilder::new(self)
    }
}
