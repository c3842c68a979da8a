use crate::areas::repository::Repository;
use std::io::Write;

impl Repository {
    /// Store the trees of the current index and print the root tree id
    pub async fn write_tree(&mut self) -> anyhow::Result<()> {
        let tree_oid = self.index_builder().write_tree().await?;

        writeln!(self.writer(), "{tree_oid}")?;

        Ok(())
    }
}
