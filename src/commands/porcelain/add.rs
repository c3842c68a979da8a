use crate::areas::repository::Repository;

impl Repository {
    /// Stage the files at `paths`; directories are expanded recursively
    pub async fn add(&mut self, paths: &[String]) -> anyhow::Result<()> {
        self.index_builder()
            .log(self.log_sink())
            .add_all(paths)
            .write()
            .await?;

        Ok(())
    }
}
