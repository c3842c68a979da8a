use crate::artifacts::core::{CoreError, Result};
use crate::artifacts::objects::object_type::ObjectType;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Directory,
    /// Link target stored as the blob content
    Symlink,
    /// Submodule commit
    Gitlink,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    pub fn as_str(&self) -> &str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Directory => "040000",
            EntryMode::Symlink => "120000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Directory => 0o40000,
            EntryMode::Symlink => 0o120000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    /// Type of the object an entry with this mode points at
    pub fn object_type(&self) -> ObjectType {
        match self {
            EntryMode::Directory => ObjectType::Tree,
            EntryMode::Gitlink => ObjectType::Commit,
            EntryMode::File(_) | EntryMode::Symlink => ObjectType::Blob,
        }
    }

    /// Parse the octal mode written in tree entries (`100644`, `40000`, ...)
    pub fn from_octal_str(mode: &str) -> Result<Self> {
        let mode = u32::from_str_radix(mode, 8)
            .map_err(|_| CoreError::corrupt(format!("invalid entry mode {mode:?}")))?;

        EntryMode::try_from(mode)
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = CoreError;

    fn try_from(mode: u32) -> Result<Self> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o40000 => Ok(EntryMode::Directory),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(CoreError::corrupt(format!("invalid entry mode {mode:o}"))),
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("40000", EntryMode::Directory)]
    #[case("120000", EntryMode::Symlink)]
    #[case("160000", EntryMode::Gitlink)]
    fn parses_tree_modes(#[case] raw: &str, #[case] expected: EntryMode) {
        pretty_assertions::assert_eq!(EntryMode::from_octal_str(raw).unwrap(), expected);
        pretty_assertions::assert_eq!(EntryMode::try_from(expected.as_u32()).unwrap(), expected);
    }

    #[test]
    fn gitlinks_point_at_commits() {
        pretty_assertions::assert_eq!(EntryMode::Gitlink.object_type(), ObjectType::Commit);
        pretty_assertions::assert_eq!(EntryMode::Symlink.object_type(), ObjectType::Blob);
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!(EntryMode::from_octal_str("100600").is_err());
        assert!(EntryMode::from_octal_str("banana").is_err());
    }
}
