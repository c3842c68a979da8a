use crate::areas::repository::Repository;

impl Repository {
    /// Stop tracking `paths`; working tree files are left alone
    pub async fn rm(&mut self, paths: &[String]) -> anyhow::Result<()> {
        self.index_builder()
            .log(self.log_sink())
            .delete_all(paths)
            .write()
            .await?;

        Ok(())
    }
}
