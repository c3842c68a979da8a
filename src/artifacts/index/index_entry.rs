//! Index entry representation
//!
//! Each entry in the index represents a tracked file with:
//! - File path relative to the working tree root
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//! - Flags, of which only assume-valid carries meaning here
//!
//! ## Entry Format
//!
//! Entries are stored in a binary format with 8-byte alignment. The 16-bit
//! flags field packs the assume-valid bit with the length of the path.

use crate::artifacts::core::{CoreError, Result};
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_id::ObjectId;
use bitflags::bitflags;
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::io::Write;
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Largest path length representable in the flags field
const MAX_PATH_SIZE: usize = 0x0fff;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Offset of the path inside a serialized entry
const NAME_OFFSET: usize = 62;

bitflags! {
    /// High bits of the on-disk flags field
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct EntryFlags: u16 {
        /// Trust the cached stat data instead of re-reading the file
        const ASSUME_VALID = 0x8000;
        /// Extended flags follow (version 3+ only, never written here)
        const EXTENDED = 0x4000;
    }
}

/// Index entry representing a tracked file
#[derive(Debug, Clone, Default, new)]
pub struct IndexEntry {
    /// File path relative to repository root
    pub name: PathBuf,
    /// SHA-1 hash of file content
    pub oid: ObjectId,
    /// File metadata (mode, size, timestamps)
    pub metadata: EntryMetadata,
    #[new(default)]
    pub flags: EntryFlags,
}

impl IndexEntry {
    pub fn basename(&self) -> Result<&str> {
        self.name
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CoreError::InvalidPath(self.name.clone()))
    }

    /// Every ancestor directory of the entry, outermost first
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();

        dirs
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    pub fn assume_valid(&self) -> bool {
        self.flags.contains(EntryFlags::ASSUME_VALID)
    }

    pub fn set_assume_valid(&mut self, valid: bool) {
        self.flags.set(EntryFlags::ASSUME_VALID, valid);
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(CoreError::corrupt("invalid index entry size"));
        }

        let ctime = byteorder::NetworkEndian::read_u32(&bytes[0..4]) as i64;
        let ctime_nsec = byteorder::NetworkEndian::read_u32(&bytes[4..8]) as i64;
        let mtime = byteorder::NetworkEndian::read_u32(&bytes[8..12]) as i64;
        let mtime_nsec = byteorder::NetworkEndian::read_u32(&bytes[12..16]) as i64;
        let dev = byteorder::NetworkEndian::read_u32(&bytes[16..20]) as u64;
        let ino = byteorder::NetworkEndian::read_u32(&bytes[20..24]) as u64;
        let mode = EntryMode::try_from(byteorder::NetworkEndian::read_u32(&bytes[24..28]))?;
        let uid = byteorder::NetworkEndian::read_u32(&bytes[28..32]);
        let gid = byteorder::NetworkEndian::read_u32(&bytes[32..36]);
        let size = byteorder::NetworkEndian::read_u32(&bytes[36..40]) as u64;
        let oid = ObjectId::read_h40_from(&mut &bytes[40..60])?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[60..NAME_OFFSET]);

        let name_end = bytes[NAME_OFFSET..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CoreError::corrupt("missing null terminator in entry name"))?;
        let name = std::str::from_utf8(&bytes[NAME_OFFSET..NAME_OFFSET + name_end])
            .map_err(|_| CoreError::corrupt("invalid UTF-8 in entry name"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            metadata: EntryMetadata {
                ctime,
                ctime_nsec,
                mtime,
                mtime_nsec,
                dev,
                ino,
                mode,
                uid,
                gid,
                size,
            },
            flags: EntryFlags::from_bits_truncate(flags),
        })
    }
}

impl PartialEq for IndexEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for IndexEntry {}

impl PartialOrd for IndexEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// File metadata stored in index entries
///
/// ## Timestamps
///
/// - `ctime`: File status change time (inode modification)
/// - `mtime`: File content modification time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl Packable for IndexEntry {
    fn serialize(&self) -> Result<Bytes> {
        let entry_name = self
            .name
            .to_str()
            .ok_or_else(|| CoreError::InvalidPath(self.name.clone()))?;
        let name_length = min(entry_name.len(), MAX_PATH_SIZE) as u16;
        let flags = (self.flags.bits() & !(MAX_PATH_SIZE as u16)) | name_length;

        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + entry_name.len());
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.dev as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.ino as u32)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.mode.as_u32())?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.uid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.gid)?;
        entry_bytes.write_u32::<byteorder::NetworkEndian>(self.metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<byteorder::NetworkEndian>(flags)?;
        entry_bytes.write_all(entry_name.as_bytes())?;

        // There must be at least one null byte at the end
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = CoreError;

    /// Build stat data from an absolute file path and its metadata
    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self> {
        if metadata.is_dir() {
            return Err(CoreError::InvalidPath(file_path.to_path_buf()));
        }

        let mode = match file_path.is_executable() {
            true => EntryMode::File(FileMode::Executable),
            false => EntryMode::File(FileMode::Regular),
        };

        Ok(Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        })
    }
}
