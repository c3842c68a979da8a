use crate::areas::repository::Repository;
use anyhow::Context;
use std::path::Path;

impl Repository {
    /// Rename `from` to `to` in the working tree and stage it as a delete
    /// plus an add
    ///
    /// The file is moved back when staging fails.
    pub async fn mv(&mut self, from: &str, to: &str) -> anyhow::Result<()> {
        let source = self.path().join(self.workspace().relativize(Path::new(from))?);
        let target = self.path().join(self.workspace().relativize(Path::new(to))?);

        if target.exists() {
            anyhow::bail!("destination exists: {to}");
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::rename(&source, &target)
            .with_context(|| format!("Failed to rename {from} to {to}"))?;

        let staged = self
            .index_builder()
            .log(self.log_sink())
            .move_path(from, to)
            .write()
            .await;

        if let Err(error) = staged {
            std::fs::rename(&target, &source)
                .with_context(|| format!("Failed to restore {from} after: {error}"))?;
            return Err(error.into());
        }

        Ok(())
    }
}
