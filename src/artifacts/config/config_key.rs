use crate::artifacts::config::{EXTENSIONS_SECTION, ORIGIN_SECTION, USER_SECTION};

/// Properties with a fixed home in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    UserName,
    UserEmail,
    /// `remote "origin".url`, used for both pull and push
    DefaultPull,
    ExtensionGitk,
    ExtensionFetch,
}

impl ConfigKey {
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::UserName | ConfigKey::UserEmail => USER_SECTION,
            ConfigKey::DefaultPull => ORIGIN_SECTION,
            ConfigKey::ExtensionGitk | ConfigKey::ExtensionFetch => EXTENSIONS_SECTION,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ConfigKey::UserName => "name",
            ConfigKey::UserEmail => "email",
            ConfigKey::DefaultPull => "url",
            ConfigKey::ExtensionGitk => "gitk",
            ConfigKey::ExtensionFetch => "fetch",
        }
    }

    /// Extension toggles are only seeded once, a user-chosen value is kept
    pub fn only_if_unset(&self) -> bool {
        matches!(self, ConfigKey::ExtensionGitk | ConfigKey::ExtensionFetch)
    }
}

impl TryFrom<&str> for ConfigKey {
    type Error = String;

    /// Accepts the dotted form used on the command line, e.g. `user.name`
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user.name" => Ok(ConfigKey::UserName),
            "user.email" => Ok(ConfigKey::UserEmail),
            "remote.origin.url" => Ok(ConfigKey::DefaultPull),
            "extensions.gitk" => Ok(ConfigKey::ExtensionGitk),
            "extensions.fetch" => Ok(ConfigKey::ExtensionFetch),
            _ => Err(format!("unknown configuration key {value:?}")),
        }
    }
}
