use crate::areas::repository::Repository;
use crate::artifacts::core::ProgressSink;
use crate::artifacts::objects::commit::Identity;
use std::io::Write;

impl Repository {
    /// Stage `paths`, then commit the whole index with `message`
    ///
    /// The identity comes from `user.name` / `user.email`, overridden by
    /// `GIT_AUTHOR_NAME`, `GIT_AUTHOR_EMAIL` and `GIT_AUTHOR_DATE`.
    pub async fn commit(
        &mut self,
        message: &str,
        paths: &[String],
        progress: &dyn ProgressSink,
    ) -> anyhow::Result<()> {
        let author = {
            let mut config = self.config_mut();
            Identity::new(config.user_name(false)?, config.email(false)?).overridden_from_env()
        };

        let summary = self
            .commit_builder()
            .log(self.log_sink())
            .progress(progress)
            .add_all(paths)
            .author(author)
            .message(message)
            .write()
            .await?;

        writeln!(self.writer(), "{summary}")?;

        Ok(())
    }
}
