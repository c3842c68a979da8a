use crate::areas::repository::Repository;
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Pretty-print the object `object_id`
    pub fn cat_file(&mut self, object_id: &str) -> anyhow::Result<()> {
        let object_id = ObjectId::try_parse(object_id.to_string())?;
        let object = self.database().parse_object(&object_id)?;

        write!(self.writer(), "{}", object.display())?;

        Ok(())
    }
}
