//! Object database
//!
//! Loose, zlib-compressed objects under `.git/objects/xx/yyyy…`. Writes go to a
//! temporary file in the target directory and are renamed into place, and an
//! object that already exists is never rewritten.

use crate::artifacts::core::{CoreError, IoContext, Result};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use bytes::Bytes;
use fake::rand;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

// TODO: read pack files so repositories touched by `git gc` stay readable
impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_id.to_path()).is_file()
    }

    /// Store an object unless it is already present; returns its id
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = ObjectId::hash(&object_content);
        let object_path = self.path.join(object_id.to_path());

        if object_path.exists() {
            tracing::trace!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        let object_dir = object_path
            .parent()
            .ok_or_else(|| CoreError::corrupt(format!("invalid object path {}", object_path.display())))?;
        std::fs::create_dir_all(object_dir)
            .io_context(|| format!("creating object directory {}", object_dir.display()))?;

        self.write_object(&object_path, object_content)?;
        tracing::debug!(oid = %object_id, kind = %object.object_type(), "stored object");

        Ok(object_id)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> Result<ObjectBox> {
        let (object_type, object_reader) = self.parse_object_as_bytes(object_id)?;

        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(
                object_reader,
            )?))),
        }
    }

    pub fn parse_object_as_tree(&self, object_id: &ObjectId) -> Result<Tree> {
        match self.parse_object_as_bytes(object_id)? {
            (ObjectType::Tree, object_reader) => Tree::deserialize(object_reader),
            (object_type, _) => Err(CoreError::corrupt(format!(
                "object {object_id} is a {object_type}, not a tree"
            ))),
        }
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> Result<Commit> {
        match self.parse_object_as_bytes(object_id)? {
            (ObjectType::Commit, object_reader) => Commit::deserialize(object_reader),
            (object_type, _) => Err(CoreError::corrupt(format!(
                "object {object_id} is a {object_type}, not a commit"
            ))),
        }
    }

    fn parse_object_as_bytes(&self, object_id: &ObjectId) -> Result<(ObjectType, Cursor<Bytes>)> {
        let object_path = self.path.join(object_id.to_path());
        let object_content = self.read_object(&object_path)?;
        let mut object_reader = Cursor::new(object_content);

        let (object_type, size) = ObjectType::parse_object_type(&mut object_reader)?;
        let remaining = object_reader.get_ref().len() - object_reader.position() as usize;
        if remaining != size {
            return Err(CoreError::corrupt(format!(
                "object {object_id} declares {size} bytes but holds {remaining}"
            )));
        }

        Ok((object_type, object_reader))
    }

    fn read_object(&self, object_path: &Path) -> Result<Bytes> {
        let object_content = std::fs::read(object_path)
            .io_context(|| format!("reading object file {}", object_path.display()))?;

        Self::decompress(object_content.into())
            .map_err(|_| CoreError::corrupt(format!("object file {} is not zlib data", object_path.display())))
    }

    fn write_object(&self, object_path: &PathBuf, object_content: Bytes) -> Result<()> {
        let object_dir = object_path
            .parent()
            .ok_or_else(|| CoreError::corrupt(format!("invalid object path {}", object_path.display())))?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)
            .io_context(|| format!("compressing {}", object_path.display()))?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .io_context(|| format!("opening object file {}", temp_object_path.display()))?;

        if let Err(error) = file.write_all(&object_content) {
            let _ = std::fs::remove_file(&temp_object_path);
            return Err(CoreError::Io {
                context: format!("writing object file {}", temp_object_path.display()),
                source: error,
            });
        }

        // rename the temp file to the object file to make it atomic
        std::fs::rename(&temp_object_path, object_path)
            .io_context(|| format!("renaming object file to {}", object_path.display()))
    }

    fn compress(data: Bytes) -> std::io::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&data)?;

        encoder.finish().map(Bytes::from)
    }

    fn decompress(data: Bytes) -> std::io::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder.read_to_end(&mut decompressed_content)?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}
