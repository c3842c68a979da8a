use crate::areas::config::{ConfigPaths, ConfigStore};
use crate::areas::repository::Repository;
use crate::artifacts::config::config_key::ConfigKey;
use crate::artifacts::config::config_layer::{join_name, split_name};
use std::io::Write;

impl Repository {
    /// Print the merged value of a dotted property name
    ///
    /// Exits with an error when the property is not set anywhere.
    pub fn config_get(&mut self, global: bool, name: &str) -> anyhow::Result<()> {
        let (section, key) = parse_name(name)?;
        let value = self.with_store(global, |store| {
            Ok(store
                .contains_property(&section, &key)
                .then(|| store.get_property(&section, &key)))
        })?;

        match value {
            Some(value) => writeln!(self.writer(), "{value}")?,
            None => anyhow::bail!("property {name} is not set"),
        }

        Ok(())
    }

    /// Set a property in the local layer
    ///
    /// Well-known properties follow their own rules (extension toggles keep
    /// an existing value); an empty value for anything else removes it.
    pub fn config_set(&mut self, global: bool, name: &str, value: &str) -> anyhow::Result<()> {
        let (section, key) = parse_name(name)?;

        self.with_store(global, |store| match ConfigKey::try_from(name) {
            Ok(known) => store.set_known(known, value),
            Err(_) => store.set_property(&section, &key, value, false),
        })?;

        Ok(())
    }

    pub fn config_unset(&mut self, global: bool, name: &str) -> anyhow::Result<()> {
        let (section, key) = parse_name(name)?;
        self.with_store(global, |store| store.remove_property(&section, &key))?;

        Ok(())
    }

    /// Print every property of the merged view as `name=value`
    pub fn config_list(&mut self, global: bool) -> anyhow::Result<()> {
        let lines = self.with_store(global, |store| {
            Ok(store
                .layer()
                .entries()
                .map(|(section, key, value)| format!("{}={value}", join_name(section, key)))
                .collect::<Vec<_>>())
        })?;

        for line in lines {
            writeln!(self.writer(), "{line}")?;
        }

        Ok(())
    }

    /// Replace the extensions section with `key=value` pairs; with no pairs,
    /// print the current extensions
    pub fn config_extensions(&mut self, global: bool, pairs: &[String]) -> anyhow::Result<()> {
        if pairs.is_empty() {
            let extensions = self.with_store(global, |store| Ok(store.extensions()))?;
            for (key, value) in extensions {
                writeln!(self.writer(), "{key}={value}")?;
            }
            return Ok(());
        }

        let pairs = pairs
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("expected key=value, got {pair}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.with_store(global, |store| store.set_extensions(pairs.iter().copied()))?;

        Ok(())
    }

    /// Run `action` against the repository store, or a fresh user store when
    /// `global` is set
    fn with_store<T>(
        &self,
        global: bool,
        action: impl FnOnce(&mut ConfigStore) -> crate::artifacts::core::Result<T>,
    ) -> anyhow::Result<T> {
        match global {
            true => {
                let mut store = ConfigStore::for_user(&ConfigPaths::default())?;
                Ok(action(&mut store)?)
            }
            false => Ok(action(&mut *self.config_mut())?),
        }
    }
}

fn parse_name(name: &str) -> anyhow::Result<(String, String)> {
    split_name(name).ok_or_else(|| anyhow::anyhow!("key does not contain a section: {name}"))
}
