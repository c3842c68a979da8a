//! Commit object
//!
//! Commits record a snapshot of the repository:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s), none for a root commit
//! - Author and committer identities
//! - Commit message
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::core::{CoreError, Result};
use crate::artifacts::objects::object::{Object, Packable, Unpackable, frame};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::BufRead;

/// Author or committer identity
///
/// Name, email and a timestamp carrying its own timezone offset.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Identity {
    /// Create an identity stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        Identity {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Identity {
            name,
            email,
            timestamp,
        }
    }

    /// Build a timestamp from epoch seconds and an offset east of UTC in minutes
    pub fn timestamp_from_epoch(seconds: i64, offset_minutes: i32) -> Result<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            CoreError::InvalidCommit(format!("timezone offset out of range: {offset_minutes}"))
        })?;
        let utc = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| CoreError::InvalidCommit(format!("timestamp out of range: {seconds}")))?;

        Ok(utc.with_timezone(&offset))
    }

    /// Replace the timestamp, keeping name and email
    pub fn with_timestamp(self, timestamp: DateTime<FixedOffset>) -> Self {
        Identity { timestamp, ..self }
    }

    /// Apply `GIT_AUTHOR_NAME`, `GIT_AUTHOR_EMAIL` and `GIT_AUTHOR_DATE` on top of `self`
    ///
    /// Unset or empty variables leave the corresponding field alone. The date
    /// is accepted in RFC 2822, `%Y-%m-%d %H:%M:%S %z` or `@<epoch> <tz>` form.
    pub fn overridden_from_env(self) -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());

        let name = var("GIT_AUTHOR_NAME").unwrap_or(self.name);
        let email = var("GIT_AUTHOR_EMAIL").unwrap_or(self.email);
        let timestamp = var("GIT_AUTHOR_DATE")
            .and_then(|date| parse_date(&date))
            .unwrap_or(self.timestamp);

        Identity {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// "Name <email>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// "Name <email> timestamp timezone", as stored in a commit
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Both name and email must be present for a commit to be written
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }

    /// Name and email fit on one `author` / `committer` header line and read
    /// back unchanged
    pub fn is_well_formed(&self) -> bool {
        let header_safe = |value: &str| !value.contains(['<', '>', '\n', '\r', '\0']);

        header_safe(&self.name) && header_safe(&self.email) && self.name.trim() == self.name
    }
}

fn parse_date(date: &str) -> Option<DateTime<FixedOffset>> {
    if let Some(raw) = date.strip_prefix('@') {
        return DateTime::parse_from_str(raw, "%s %z").ok();
    }

    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
        .ok()
}

impl TryFrom<&str> for Identity {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self> {
        // "name <email> timestamp timezone", split from the right
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(CoreError::corrupt(format!("invalid identity line {value:?}")));
        }

        let timestamp = DateTime::parse_from_str(&format!("{} {}", parts[1], parts[0]), "%s %z")
            .map_err(|_| CoreError::corrupt(format!("invalid identity timestamp {value:?}")))?;

        let name_email = parts[2];
        let email_start = name_email
            .find('<')
            .ok_or_else(|| CoreError::corrupt("identity is missing '<'"))?;
        let email_end = name_email
            .rfind('>')
            .filter(|&end| end > email_start)
            .ok_or_else(|| CoreError::corrupt("identity is missing '>'"))?;

        Ok(Identity {
            name: name_email[..email_start].trim().to_string(),
            email: name_email[email_start + 1..email_end].to_string(),
            timestamp,
        })
    }
}

/// Commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Identity,
    committer: Identity,
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Identity,
        committer: Identity,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            message,
        }
    }

    /// First line of the message
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn author(&self) -> &Identity {
        &self.author
    }

    pub fn committer(&self) -> &Identity {
        &self.committer
    }

    fn content(&self) -> String {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n")
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Result<Bytes> {
        frame(self.object_type(), self.content().as_bytes())
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|_| CoreError::corrupt("commit object is not valid UTF-8"))?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| CoreError::corrupt("commit object has no message separator"))?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| CoreError::corrupt(format!("invalid commit header {line:?}")))?;
            match key {
                "tree" => tree_oid = Some(ObjectId::try_parse(value.to_string())?),
                "parent" => parents.push(ObjectId::try_parse(value.to_string())?),
                "author" => author = Some(Identity::try_from(value)?),
                "committer" => committer = Some(Identity::try_from(value)?),
                // unknown headers (gpgsig, encoding) are not interpreted
                _ => {}
            }
        }

        let tree_oid = tree_oid.ok_or_else(|| CoreError::corrupt("commit has no tree"))?;
        let author = author.ok_or_else(|| CoreError::corrupt("commit has no author"))?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Commit::new(
            parents,
            tree_oid,
            author,
            committer,
            message.to_string(),
        ))
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        self.content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Cursor;

    fn identity() -> Identity {
        let timestamp = Identity::timestamp_from_epoch(1_700_000_000, 120).unwrap();
        Identity::new_with_timestamp("Ada".into(), "ada@example.com".into(), timestamp)
    }

    #[test]
    fn identity_line_uses_epoch_and_offset() {
        assert_eq!(
            identity().display(),
            "Ada <ada@example.com> 1700000000 +0200"
        );
    }

    #[test]
    fn identity_parses_back_from_commit_header() {
        let parsed = Identity::try_from("Ada Lovelace <ada@example.com> 1700000000 -0530").unwrap();

        assert_eq!(parsed.name(), "Ada Lovelace");
        assert_eq!(parsed.email(), "ada@example.com");
        assert_eq!(parsed.timestamp().timestamp(), 1_700_000_000);
        assert_eq!(parsed.timestamp().offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
    }

    #[test]
    fn incomplete_identity_is_detected() {
        let identity = Identity::new_with_timestamp(" ".into(), "a@b".into(), identity().timestamp());

        assert!(!identity.is_complete());
    }

    #[rstest]
    #[case("Ada\nparent 0000000000000000000000000000000000000000\nx", "a@x")]
    #[case("Ada <evil>", "a@x")]
    #[case("Ada", "a@x>\ncommitter B <b@x> 0 +0000")]
    #[case("Ada", "a\0@x")]
    #[case(" Ada ", "a@x")]
    fn identities_that_break_the_header_are_rejected(#[case] name: &str, #[case] email: &str) {
        let identity = Identity::new_with_timestamp(name.into(), email.into(), identity().timestamp());

        assert!(identity.is_complete());
        assert!(!identity.is_well_formed());
    }

    #[test]
    fn well_formed_identity_reads_back_unchanged() {
        let line = identity().display();

        assert!(identity().is_well_formed());
        assert_eq!(Identity::try_from(line.as_str()).unwrap(), identity());
    }

    #[test]
    fn root_commit_has_no_parent_header() {
        let tree = ObjectId::hash(b"tree 0\0");
        let commit = Commit::new(vec![], tree.clone(), identity(), identity(), "init\n".into());

        let text = commit.display();

        assert!(text.starts_with(&format!("tree {tree}\nauthor ")));
        assert!(!text.contains("parent "));
    }

    #[test]
    fn commit_reads_back_with_parent_and_committer() {
        let parent = ObjectId::hash(b"parent");
        let committer = Identity::new_with_timestamp(
            "Bob".into(),
            "bob@example.com".into(),
            identity().timestamp(),
        );
        let commit = Commit::new(
            vec![parent.clone()],
            ObjectId::hash(b"tree"),
            identity(),
            committer.clone(),
            "second\n\nbody\n".into(),
        );

        let mut reader = Cursor::new(commit.serialize().unwrap());
        ObjectType::parse_object_type(&mut reader).unwrap();
        let read = Commit::deserialize(reader).unwrap();

        assert_eq!(read.parents(), &[parent]);
        assert_eq!(read.committer(), &committer);
        assert_eq!(read.message(), "second\n\nbody\n");
        assert_eq!(read.object_id().unwrap(), commit.object_id().unwrap());
    }
}
