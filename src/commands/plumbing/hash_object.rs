use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use std::io::Write;
use std::path::Path;

impl Repository {
    /// Print the blob id of a working tree file, storing the blob when `write` is set
    pub fn hash_object(&mut self, object_path: &str, write: bool) -> anyhow::Result<()> {
        let relative = self.workspace().relativize(Path::new(object_path))?;
        let blob = self.workspace().parse_blob(&relative)?;

        let object_id = match write {
            true => self.database().store(&blob)?,
            false => blob.object_id()?,
        };

        writeln!(self.writer(), "{object_id}")?;

        Ok(())
    }
}
