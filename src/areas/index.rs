//! Index (staging area)
//!
//! The index lists every tracked file with its blob id, mode and stat data.
//! It is the input of tree construction.
//!
//! ## Index File Format
//!
//! - Header: `DIRC` signature, version 2 and entry count
//! - Entries: sorted by path, each padded to 8 bytes
//! - Extensions: cached data such as `TREE`; optional ones are read past and
//!   not written back
//! - Checksum: SHA-1 over everything before it
//!
//! ## Data Structures
//!
//! - `entries`: maps file paths to their index entries
//! - `children`: maps directory paths to the files below them, so removing a
//!   directory removes its whole subtree

use crate::artifacts::core::{CoreError, IoContext, Lockfile, Result};
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, EXTENSION_HEADER_SIZE, HEADER_SIZE};
use crate::artifacts::objects::object::Packable;
use byteorder::ByteOrder;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    /// Keyed by the path bytes, the order entries are stored in
    entries: BTreeMap<String, IndexEntry>,
    children: BTreeMap<Box<Path>, BTreeSet<Box<Path>>>,
    /// Set when an entry was added or removed since the last load or write
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&key(path))
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = false;
    }

    /// Reload the index from disk
    ///
    /// A missing or empty index file means no tracked files. The file is
    /// never created here.
    ///
    /// # Locking
    ///
    /// Holds a shared lock on the index file while reading it.
    pub fn rehydrate(&mut self) -> Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let path = self.path.clone();
        let mut index_file = std::fs::File::open(&path)
            .io_context(|| format!("opening index {}", path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .io_context(|| format!("locking index {}", path.display()))?;

        let mut bytes = Vec::new();
        lock.deref_mut()
            .read_to_end(&mut bytes)
            .io_context(|| format!("reading index {}", path.display()))?;

        self.load_bytes(&bytes)
    }

    /// Replace the in-memory entries with the content of an index file
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.clear();

        if bytes.is_empty() {
            return Ok(());
        }

        let mut reader = Checksum::new(Cursor::new(bytes));
        let header = IndexHeader::parse(&reader.read(HEADER_SIZE)?)?;
        self.parse_entries(header.entries_count, &mut reader)?;
        skip_extensions(&mut reader, bytes.len())?;

        reader.verify()?;
        self.changed = false;

        Ok(())
    }

    /// Parse all entries, each a 64 byte minimum extended in 8 byte blocks
    /// until its NUL padded path ends
    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum<Cursor<&[u8]>>) -> Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::parse(&entry_bytes)?;
            self.store_entry(&entry);
        }

        Ok(())
    }

    /// A file replaces any entry at one of its parent paths, and a file that
    /// becomes a directory loses its old entry
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.name);
    }

    fn store_entry(&mut self, entry: &IndexEntry) {
        self.entries.insert(key(&entry.name), entry.clone());

        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.into())
                .or_default()
                .insert(entry.name.clone().into_boxed_path());
        }
    }

    fn remove_children(&mut self, path_name: &Path) {
        if let Some(children) = self.children.remove(path_name) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    fn remove_entry(&mut self, path_name: &Path) -> bool {
        match self.entries.remove(&key(path_name)) {
            None => false,
            Some(entry) => {
                for parent in entry.parent_dirs() {
                    if let Some(children) = self.children.get_mut(parent) {
                        children.remove(path_name);
                        if children.is_empty() {
                            self.children.remove(parent);
                        }
                    }
                }

                true
            }
        }
    }

    /// Insert or replace the entry for `entry.name`
    pub fn add(&mut self, entry: IndexEntry) {
        self.discard_conflicts(&entry);
        self.store_entry(&entry);

        self.changed = true;
    }

    /// Remove the entry at `path` and every entry below it
    ///
    /// Returns whether anything was removed; an untracked path is a no-op.
    pub fn remove(&mut self, path: &Path) -> bool {
        let had_children = self.children.contains_key(path);
        let removed = self.remove_entry(path);
        self.remove_children(path);

        let changed = removed || had_children;
        self.changed |= changed;

        changed
    }

    /// Serialize header, entries and trailer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Checksum::new(Vec::new());

        let header = IndexHeader {
            entries_count: self.entries.len() as u32,
            ..IndexHeader::empty()
        };
        writer.write(&header.serialize()?)?;

        for entry in self.entries() {
            writer.write(&entry.serialize()?)?;
        }

        writer.write_checksum()?;
        Ok(writer.into_inner())
    }

    /// Persist the index through `index.lock`
    ///
    /// Either the whole new index is renamed over the old one or the old one
    /// stays in place.
    pub fn write_updates(&mut self) -> Result<()> {
        let bytes = self.to_bytes()?;

        let mut lock = Lockfile::acquire(&self.path)?;
        lock.write_all(&bytes)?;
        lock.commit()?;

        tracing::debug!(entries = self.entries.len(), path = %self.path.display(), "index written");
        self.changed = false;

        Ok(())
    }

    /// Entries sorted by path bytes
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Paths of the tracked files at or below `path`
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|entry| entry.name.starts_with(path))
            .map(|entry| entry.name.clone())
            .collect()
    }
}

/// Read past the extensions between the last entry and the trailer
///
/// Their bytes still feed the checksum. An extension whose signature does not
/// start with an uppercase letter is required to understand the index and is
/// rejected.
fn skip_extensions(reader: &mut Checksum<Cursor<&[u8]>>, total: usize) -> Result<()> {
    while (reader.get_ref().position() as usize) + CHECKSUM_SIZE < total {
        let header = reader.read(EXTENSION_HEADER_SIZE)?;
        let signature = String::from_utf8_lossy(&header[..4]).into_owned();
        let size = byteorder::NetworkEndian::read_u32(&header[4..]) as usize;

        if !header[0].is_ascii_uppercase() {
            return Err(CoreError::corrupt(format!("unsupported index extension {signature:?}")));
        }
        let left = total.saturating_sub(reader.get_ref().position() as usize + CHECKSUM_SIZE);
        if size > left {
            return Err(CoreError::corrupt(format!("index extension {signature:?} is truncated")));
        }

        reader.read(size)?;
        tracing::debug!(extension = %signature, size, "skipped index extension");
    }

    Ok(())
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::core::CoreError;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use crate::artifacts::objects::object_id::ObjectId;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn entry(path: &str) -> IndexEntry {
        IndexEntry::new(PathBuf::from(path), ObjectId::hash(path.as_bytes()), EntryMetadata::default())
    }

    fn names(index: &Index) -> Vec<String> {
        index
            .entries()
            .map(|entry| entry.name.display().to_string())
            .collect()
    }

    #[fixture]
    fn dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[rstest]
    fn missing_index_loads_empty_without_creating_the_file(dir: TempDir) {
        let mut index = Index::new(dir.path().join("index").into_boxed_path());

        index.rehydrate().unwrap();

        assert!(index.is_empty());
        assert!(!dir.path().join("index").exists());
    }

    #[rstest]
    fn written_index_loads_back(dir: TempDir) {
        let path = dir.path().join("index").into_boxed_path();
        let mut index = Index::new(path.clone());
        index.add(entry("b.txt"));
        index.add(entry("a/c.txt"));
        index.add(entry("a.b"));
        index.write_updates().unwrap();

        let mut loaded = Index::new(path);
        loaded.rehydrate().unwrap();

        assert_eq!(names(&loaded), vec!["a.b", "a/c.txt", "b.txt"]);
        assert!(!loaded.is_changed());
        assert!(!dir.path().join("index.lock").exists());
    }

    #[test]
    fn file_replaces_directory_and_directory_replaces_file() {
        let mut index = Index::new(PathBuf::from("index").into_boxed_path());
        index.add(entry("a/b.txt"));
        index.add(entry("a/c.txt"));

        index.add(entry("a"));
        assert_eq!(names(&index), vec!["a"]);

        index.add(entry("a/d.txt"));
        assert_eq!(names(&index), vec!["a/d.txt"]);
    }

    #[test]
    fn removing_a_directory_removes_its_subtree() {
        let mut index = Index::new(PathBuf::from("index").into_boxed_path());
        index.add(entry("dir/one"));
        index.add(entry("dir/sub/two"));
        index.add(entry("other"));

        assert!(index.remove(Path::new("dir")));
        assert!(!index.remove(Path::new("missing")));

        assert_eq!(names(&index), vec!["other"]);
    }

    /// Index bytes with `extension` between the entries and the trailer
    fn with_extension(index: &Index, signature: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let bytes = index.to_bytes().unwrap();
        let mut writer = Checksum::new(Vec::new());
        writer.write(&bytes[..bytes.len() - CHECKSUM_SIZE]).unwrap();
        writer.write(signature).unwrap();
        writer.write(&(payload.len() as u32).to_be_bytes()).unwrap();
        writer.write(payload).unwrap();
        writer.write_checksum().unwrap();

        writer.into_inner()
    }

    #[rstest]
    fn optional_extensions_are_read_past(dir: TempDir) {
        let path = dir.path().join("index");
        let mut index = Index::new(path.clone().into_boxed_path());
        index.add(entry("a.txt"));
        index.add(entry("dir/b.txt"));
        // cache-tree as git writes it after a commit: root then one subtree
        let mut tree = b"\x002 1\n".to_vec();
        tree.extend_from_slice(&[0x11; 20]);
        tree.extend_from_slice(b"dir\x001 0\n");
        tree.extend_from_slice(&[0x22; 20]);
        std::fs::write(&path, with_extension(&index, b"TREE", &tree)).unwrap();

        let mut loaded = Index::new(path.clone().into_boxed_path());
        loaded.rehydrate().unwrap();
        assert_eq!(names(&loaded), vec!["a.txt", "dir/b.txt"]);

        loaded.add(entry("c.txt"));
        loaded.write_updates().unwrap();
        let mut reloaded = Index::new(path.into_boxed_path());
        reloaded.rehydrate().unwrap();
        assert_eq!(names(&reloaded), vec!["a.txt", "c.txt", "dir/b.txt"]);
    }

    #[rstest]
    #[case(b"link", 8)]
    #[case(b"TREE", 4096)]
    fn unreadable_extensions_are_state_errors(#[case] signature: &[u8; 4], #[case] declared: u32) {
        let mut index = Index::new(PathBuf::from("index").into_boxed_path());
        index.add(entry("a.txt"));
        let mut bytes = with_extension(&index, signature, &[0; 8]);
        let at = bytes.len() - CHECKSUM_SIZE - 8 - 4;
        bytes[at..at + 4].copy_from_slice(&declared.to_be_bytes());

        let result = index.load_bytes(&bytes);

        assert!(matches!(result, Err(CoreError::RepositoryState(_))));
    }

    #[test]
    fn symlink_and_gitlink_modes_survive_a_rewrite() {
        let mut index = Index::new(PathBuf::from("index").into_boxed_path());
        for (path, mode) in [("link", EntryMode::Symlink), ("vendor/lib", EntryMode::Gitlink)] {
            let mut linked = entry(path);
            linked.metadata.mode = mode;
            index.add(linked);
        }
        let bytes = index.to_bytes().unwrap();

        let mut loaded = Index::new(PathBuf::from("index").into_boxed_path());
        loaded.load_bytes(&bytes).unwrap();

        let modes = loaded.entries().map(|entry| entry.mode()).collect::<Vec<_>>();
        assert_eq!(modes, vec![EntryMode::Symlink, EntryMode::Gitlink]);
        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }

    #[rstest]
    fn flipped_byte_is_a_state_error(dir: TempDir) {
        let path = dir.path().join("index");
        let mut index = Index::new(path.clone().into_boxed_path());
        index.add(entry("file"));
        let mut bytes = index.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let result = index.rehydrate();

        assert!(matches!(result, Err(CoreError::RepositoryState(_))));
    }
}
