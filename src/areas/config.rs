//! Layered configuration store
//!
//! A store owns one writable *local* layer and a read-only *defaults* layer.
//! For a repository the local layer is `<git-dir>/config` and the defaults
//! are the user file filled from the system file; for the user store the local
//! layer is the user file and the defaults are the system file.
//!
//! Reads go through the merged view, in which a key present in the local
//! layer always wins. Writes touch the local layer only and are persisted at
//! once.

use crate::artifacts::config::config_key::ConfigKey;
use crate::artifacts::config::config_layer::{ConfigLayer, Section};
use crate::artifacts::config::EXTENSIONS_SECTION;
use crate::artifacts::core::{CoreError, IoContext, Lockfile, Result};
use std::path::{Path, PathBuf};

const USER_CONFIG_FILE: &str = ".gitconfig";
const SYSTEM_CONFIG_FILE: &str = "/etc/gitconfig";

/// Locations of the user and system configuration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub user: Option<PathBuf>,
    pub system: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn new(user: Option<PathBuf>, system: Option<PathBuf>) -> Self {
        Self { user, system }
    }

    /// `GIT_CONFIG_GLOBAL` / `GIT_CONFIG_SYSTEM` when set, otherwise
    /// `~/.gitconfig` and `/etc/gitconfig`
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from);

        Self {
            user: var("GIT_CONFIG_GLOBAL").or_else(|| dirs::home_dir().map(|home| home.join(USER_CONFIG_FILE))),
            system: var("GIT_CONFIG_SYSTEM").or_else(|| Some(PathBuf::from(SYSTEM_CONFIG_FILE))),
        }
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::from_env()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    local_path: PathBuf,
    /// Highest priority first
    default_paths: Vec<PathBuf>,
    local: ConfigLayer,
    merged: ConfigLayer,
}

impl ConfigStore {
    /// Store for `<git_dir>/config`, defaulting to the user and system files
    pub fn for_repository(git_dir: &Path, paths: &ConfigPaths) -> Result<Self> {
        let default_paths = [&paths.user, &paths.system]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        Self::load(git_dir.join("config"), default_paths)
    }

    /// Store for the user file, defaulting to the system file
    pub fn for_user(paths: &ConfigPaths) -> Result<Self> {
        let user = paths.user.clone().ok_or_else(|| CoreError::Io {
            context: String::from("locating the user configuration file"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "home directory is unknown"),
        })?;

        Self::load(user, paths.system.iter().cloned().collect())
    }

    fn load(local_path: PathBuf, default_paths: Vec<PathBuf>) -> Result<Self> {
        let mut store = ConfigStore {
            local_path,
            default_paths,
            local: ConfigLayer::default(),
            merged: ConfigLayer::default(),
        };
        store.reload()?;

        Ok(store)
    }

    /// Re-read every file and rebuild the merged view
    pub fn reload(&mut self) -> Result<()> {
        self.local = load_layer(&self.local_path)?;
        self.rebuild_merged()
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// The merged view
    pub fn layer(&self) -> &ConfigLayer {
        &self.merged
    }

    /// Value from the merged view, empty when absent
    pub fn get_property(&self, section: &str, key: &str) -> String {
        self.merged.get(section, key).unwrap_or_default().to_string()
    }

    pub fn contains_property(&self, section: &str, key: &str) -> bool {
        self.merged.contains(section, key)
    }

    pub fn properties(&self, section: &str) -> Section {
        self.merged.section(section).unwrap_or_default()
    }

    pub fn user_name(&mut self, reload: bool) -> Result<String> {
        self.known(ConfigKey::UserName, reload)
    }

    pub fn email(&mut self, reload: bool) -> Result<String> {
        self.known(ConfigKey::UserEmail, reload)
    }

    pub fn default_pull(&mut self, reload: bool) -> Result<String> {
        self.known(ConfigKey::DefaultPull, reload)
    }

    /// Push shares the pull URL
    pub fn default_push(&mut self, reload: bool) -> Result<String> {
        self.known(ConfigKey::DefaultPull, reload)
    }

    pub fn extensions(&self) -> Section {
        self.properties(EXTENSIONS_SECTION)
    }

    fn known(&mut self, key: ConfigKey, reload: bool) -> Result<String> {
        if reload {
            self.reload()?;
        }

        Ok(self.get_property(key.section(), key.key()))
    }

    /// Set a key in the local layer
    ///
    /// An empty value removes the key unless `allow_empty` is set.
    pub fn set_property(&mut self, section: &str, key: &str, value: &str, allow_empty: bool) -> Result<()> {
        if value.is_empty() && !allow_empty {
            return self.remove_property(section, key);
        }

        self.local.set(section, key, value);
        self.persist()
    }

    /// Set a well-known property
    ///
    /// Extension toggles keep whatever non-empty value they already have.
    pub fn set_known(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        if key.only_if_unset() {
            if !self.get_property(key.section(), key.key()).is_empty() {
                return Ok(());
            }
            return self.set_property(key.section(), key.key(), value, true);
        }

        self.set_property(key.section(), key.key(), value, false)
    }

    pub fn set_user_name(&mut self, value: &str) -> Result<()> {
        self.set_known(ConfigKey::UserName, value)
    }

    pub fn set_email(&mut self, value: &str) -> Result<()> {
        self.set_known(ConfigKey::UserEmail, value)
    }

    /// Remove a key from the local layer; nothing is written when it is absent
    pub fn remove_property(&mut self, section: &str, key: &str) -> Result<()> {
        match self.local.remove(section, key) {
            true => self.persist(),
            false => Ok(()),
        }
    }

    /// Drop every key of a local section, keeping the section header
    pub fn clear_properties(&mut self, section: &str) -> Result<()> {
        match self.local.clear(section) {
            true => self.persist(),
            false => Ok(()),
        }
    }

    /// Replace the extensions section with `pairs`, empty values included
    pub fn set_extensions<'p>(&mut self, pairs: impl IntoIterator<Item = (&'p str, &'p str)>) -> Result<()> {
        self.local.clear(EXTENSIONS_SECTION);
        for (key, value) in pairs {
            self.local.set(EXTENSIONS_SECTION, key, value);
        }

        self.persist()
    }

    fn persist(&mut self) -> Result<()> {
        let mut lock = Lockfile::acquire(&self.local_path)?;
        lock.write_all(self.local.serialize().as_bytes())?;
        lock.commit()?;
        tracing::debug!(path = %self.local_path.display(), "configuration written");

        self.rebuild_merged()
    }

    fn rebuild_merged(&mut self) -> Result<()> {
        let mut merged = self.local.clone();
        for path in &self.default_paths {
            merged.merge_missing(&load_layer(path)?);
        }
        self.merged = merged;

        Ok(())
    }
}

/// Parse one file; a missing file is an empty layer
fn load_layer(path: &Path) -> Result<ConfigLayer> {
    match std::fs::read_to_string(path) {
        Ok(text) => ConfigLayer::parse(path, &text),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "configuration file not found, falling back to defaults");
            Ok(ConfigLayer::default())
        }
        Err(error) => Err(error).io_context(|| format!("reading configuration {}", path.display())),
    }
}
