//! Tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs)
//! and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! ## Ordering
//!
//! Entries are kept in a `BTreeMap` keyed by name, with directories keyed as
//! `name/`. That reproduces the canonical ordering, where a directory sorts as
//! if its name ended with a slash, so the same set of index entries always
//! serializes to the same bytes and therefore the same object ID.

use crate::artifacts::core::{CoreError, Result};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

/// Internal tree entry representation while building
#[derive(Debug, Clone)]
enum TreeEntry {
    /// File entry (blob)
    File(IndexEntry),
    /// Directory entry (nested tree)
    Directory(Tree),
}

impl TreeEntry {
    fn object_type(&self) -> ObjectType {
        self.mode().object_type()
    }

    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::File(entry) => entry.mode(),
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> Result<ObjectId> {
        match self {
            TreeEntry::File(entry) => Ok(entry.oid.clone()),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

/// Tree object representing a directory snapshot
///
/// Trees maintain two sets of entries:
/// - `readable_entries`: for trees loaded from the database
/// - `writeable_entries`: for trees being built from the index
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// Entries loaded from database (read mode)
    readable_entries: BTreeMap<String, DatabaseEntry>,
    /// Entries being built (write mode)
    writeable_entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Build a tree from index entries
    ///
    /// Creates a hierarchical tree structure from a flat list of index entries.
    /// The result only depends on the set of entries, not on their order.
    pub fn build<'e>(entries: impl Iterator<Item = &'e IndexEntry>) -> Result<Self> {
        let mut root = Self::default();

        for entry in entries {
            let parents = entry.parent_dirs();
            root.add_entry(&parents, entry)?;
        }

        Ok(root)
    }

    /// Traverse the tree depth-first, calling a function on each node
    ///
    /// Visits children before parents (post-order), so a subtree is always
    /// handed out before the tree that references it.
    pub fn traverse<F>(&self, func: &mut F) -> Result<()>
    where
        F: FnMut(&Tree) -> Result<()>,
    {
        for entry in self.writeable_entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(func)?;
            }
        }
        func(self)
    }

    fn add_entry(&mut self, parents: &[&Path], entry: &IndexEntry) -> Result<()> {
        match parents.split_first() {
            None => {
                self.writeable_entries.insert(
                    entry.basename()?.to_string(),
                    TreeEntry::File(entry.clone()),
                );
            }
            Some((parent, rest)) => {
                let parent = parent
                    .file_name()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| CoreError::InvalidPath(entry.name.clone()))?;
                let key = format!("{parent}/");

                let subtree = self
                    .writeable_entries
                    .entry(key)
                    .or_insert_with(|| TreeEntry::Directory(Tree::default()));

                match subtree {
                    TreeEntry::Directory(tree) => tree.add_entry(rest, entry)?,
                    TreeEntry::File(_) => unreachable!("directory keys always end with '/'"),
                }
            }
        }

        Ok(())
    }

    /// Entries of a tree read from the database, names without the directory slash
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DatabaseEntry)> {
        self.readable_entries
            .iter()
            .map(|(name, entry)| (name.trim_end_matches('/'), entry))
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, DatabaseEntry)> {
        self.readable_entries
            .into_iter()
            .map(|(name, entry)| (name.trim_end_matches('/').to_string(), entry))
    }

    /// `(name, type, mode, oid)` for every entry, in serialization order
    fn listing(&self) -> Result<Vec<(String, ObjectType, EntryMode, ObjectId)>> {
        let written = self.writeable_entries.iter().map(|(name, entry)| {
            Ok((
                name.trim_end_matches('/').to_string(),
                entry.object_type(),
                entry.mode(),
                entry.oid()?,
            ))
        });
        let read = self.readable_entries.iter().map(|(name, entry)| {
            Ok((
                name.trim_end_matches('/').to_string(),
                entry.mode.object_type(),
                entry.mode,
                entry.oid.clone(),
            ))
        });

        written.chain(read).collect()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, _, mode, oid) in self.listing()? {
            write!(content_bytes, "{:o} {}", mode.as_u32(), name)?;
            content_bytes.push(0);
            oid.write_h40_to(&mut content_bytes)?;
        }

        frame(self.object_type(), &content_bytes)
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut entries = BTreeMap::new();

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(CoreError::corrupt("unexpected EOF in tree entry mode"));
            }

            let mode = std::str::from_utf8(&mode_bytes)
                .map_err(|_| CoreError::corrupt("tree entry mode is not UTF-8"))?;
            let mode = EntryMode::from_octal_str(mode)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(CoreError::corrupt("unexpected EOF in tree entry name"));
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| CoreError::corrupt("tree entry name is not UTF-8"))?
                .to_owned();

            let oid = ObjectId::read_h40_from(&mut reader)?;
            let key = match mode.is_tree() {
                true => format!("{name}/"),
                false => name,
            };

            entries.insert(key, DatabaseEntry::new(oid, mode));
        }

        Ok(Tree {
            readable_entries: entries,
            writeable_entries: Default::default(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.listing()
            .unwrap_or_default()
            .into_iter()
            .map(|(name, object_type, mode, oid)| {
                format!("{} {} {}\t{}", mode.as_str(), object_type, oid, name)
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}
