//! References
//!
//! `HEAD` is normally a symbolic reference (`ref: refs/heads/master`) naming
//! the branch whose tip a new commit advances. Before the first commit the
//! branch file does not exist yet.
//!
//! ## File Format
//!
//! References are stored as text files containing either:
//! - A 40-character SHA-1 hash (direct reference)
//! - `ref: <path>` for symbolic references

use crate::artifacts::core::{CoreError, IoContext, Lockfile, Result};
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;
use std::path::{Path, PathBuf};

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Branch a fresh repository points `HEAD` at
pub const DEFAULT_BRANCH: &str = "master";

/// Symbolic refs nested deeper than this are treated as a loop
const MAX_SYMREF_DEPTH: usize = 5;

/// Name of a reference relative to the git directory, e.g. `refs/heads/master`
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct SymRefName(String);

impl SymRefName {
    pub fn head() -> Self {
        SymRefName(HEAD_REF_NAME.to_string())
    }

    pub fn as_ref_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Branch name for refs under `refs/heads/`, or the raw name otherwise
    pub fn short_name(&self) -> &str {
        self.0.strip_prefix("refs/heads/").unwrap_or(&self.0)
    }
}

impl AsRef<str> for SymRefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymRefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef { sym_ref_name: SymRefName },
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read_symref_or_oid(path: &Path) -> Result<Option<SymRefOrOid>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .io_context(|| format!("reading ref file {}", path.display()))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_regex = regex::Regex::new(SYMREF_REGEX)
            .map_err(|error| CoreError::corrupt(format!("symref pattern: {error}")))?;

        match symref_regex.captures(content) {
            Some(symref_match) => Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new(symref_match[1].to_string()),
            })),
            None => ObjectId::try_parse(content.to_string())
                .map(|oid| Some(SymRefOrOid::Oid(oid)))
                .map_err(|_| {
                    CoreError::RepositoryState(format!(
                        "ref file {} holds neither an object id nor a symbolic ref",
                        path.display()
                    ))
                }),
        }
    }
}

/// Reads and writes the references under a git directory
#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

impl Refs {
    /// Follow symbolic references from `source` (HEAD by default) to the
    /// reference that holds an object id, or would hold one once written
    pub fn current_ref(&self, source: Option<SymRefName>) -> Result<SymRefName> {
        let mut current = source.unwrap_or_else(SymRefName::head);

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read_symref_or_oid(&self.path.join(current.as_ref_path()))? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        Err(CoreError::RepositoryState(format!(
            "symbolic ref loop starting at {HEAD_REF_NAME}"
        )))
    }

    /// Object id `HEAD` resolves to, `None` before the first commit
    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        self.read_ref(&SymRefName::head())
    }

    pub fn read_ref(&self, name: &SymRefName) -> Result<Option<ObjectId>> {
        let target = self.current_ref(Some(name.clone()))?;

        match SymRefOrOid::read_symref_or_oid(&self.path.join(target.as_ref_path()))? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            Some(SymRefOrOid::SymRef { .. }) | None => Ok(None),
        }
    }

    /// Point the branch `HEAD` resolves to (or `HEAD` itself when detached)
    /// at `oid`
    pub fn update_head(&self, oid: &ObjectId) -> Result<SymRefName> {
        let target = self.current_ref(None)?;
        self.update_ref_file(&self.path.join(target.as_ref_path()), &format!("{oid}\n"))?;

        tracing::debug!(reference = %target, %oid, "ref updated");
        Ok(target)
    }

    /// Make `HEAD` a symbolic ref to `refs/heads/<branch>`
    pub fn set_head(&self, branch: &str) -> Result<()> {
        self.update_ref_file(&self.head_path(), &format!("ref: refs/heads/{branch}\n"))
    }

    fn update_ref_file(&self, path: &Path, raw_ref: &str) -> Result<()> {
        let mut lock = Lockfile::acquire(path)?;
        lock.write_all(raw_ref.as_bytes())?;
        lock.commit()
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }
}
