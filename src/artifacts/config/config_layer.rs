//! One configuration file
//!
//! ## Format
//!
//! ```text
//! # comment
//! [user]
//!     name = Ada Lovelace
//!     email = "ada@example.com" ; trailing comment
//! [remote "origin"]
//!     url = https://example.com/repo.git
//! ```
//!
//! Sections are keyed by their header text with the subsection re-quoted
//! (`remote "origin"`). Names are case-sensitive. A key without `=` has the
//! value `true`. Comments are dropped when the layer is written back.

use crate::artifacts::core::{CoreError, Result};
use indexmap::IndexMap;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

/// Last value of every key in one section
pub type Section = IndexMap<String, String>;

/// Every value of every key, in file order; keys such as `remote.*.fetch`
/// repeat
type Entries = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    sections: IndexMap<String, Entries>,
}

impl ConfigLayer {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        Parser::new(path, text).parse()
    }

    /// Render the layer in git-config syntax
    pub fn serialize(&self) -> String {
        let mut out = String::new();

        for (section, entries) in &self.sections {
            out.push_str(&format!("[{section}]\n"));
            for (key, values) in entries {
                for value in values {
                    out.push_str(&format!("\t{key} = {}\n", quote(value)));
                }
            }
        }

        out
    }

    /// Copy in every section and key of `defaults` that `self` lacks
    ///
    /// Values already present in `self` always win.
    pub fn merge_missing(&mut self, defaults: &ConfigLayer) {
        for (section, entries) in &defaults.sections {
            let target = self.sections.entry(section.clone()).or_default();
            for (key, values) in entries {
                target
                    .entry(key.clone())
                    .or_insert_with(|| values.clone());
            }
        }
    }

    /// Last value of `key`, as git reads it
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    pub fn contains(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }

    pub fn section(&self, section: &str) -> Option<Section> {
        self.sections.get(section).map(|entries| {
            entries
                .iter()
                .filter_map(|(key, values)| Some((key.clone(), values.last()?.clone())))
                .collect()
        })
    }

    /// Every `(section, key, value)` in file order, repeated keys included
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.sections.iter().flat_map(|(section, entries)| {
            entries.iter().flat_map(move |(key, values)| {
                values
                    .iter()
                    .map(move |value| (section.as_str(), key.as_str(), value.as_str()))
            })
        })
    }

    /// Set `key` to `value`
    ///
    /// A repeated key keeps its earlier values; only the last one, the value
    /// reads see, is replaced.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let values = self
            .sections
            .entry(section.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default();

        match values.last_mut() {
            Some(last) => *last = value.to_string(),
            None => values.push(value.to_string()),
        }
    }

    /// Add another value for `key` after the existing ones
    pub fn append(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Remove every value of a key, returning whether it was present
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        self.sections
            .get_mut(section)
            .and_then(|entries| entries.shift_remove(key))
            .is_some()
    }

    /// Empty a section, keeping its header; returns whether the section exists
    pub fn clear(&mut self, section: &str) -> bool {
        match self.sections.get_mut(section) {
            Some(entries) => {
                entries.clear();
                true
            }
            None => false,
        }
    }
}

/// Split a dotted name into section and key
///
/// `user.name` gives `("user", "name")` and `remote.origin.url` gives
/// `("remote \"origin\"", "url")`.
pub fn split_name(name: &str) -> Option<(String, String)> {
    let (head, key) = name.rsplit_once('.')?;
    if head.is_empty() || key.is_empty() {
        return None;
    }

    let section = match head.split_once('.') {
        Some((section, subsection)) => format!("{section} \"{subsection}\""),
        None => head.to_string(),
    };

    Some((section, key.to_string()))
}

/// Inverse of [`split_name`]: `("remote \"origin\"", "url")` gives `remote.origin.url`
pub fn join_name(section: &str, key: &str) -> String {
    match section.split_once(' ') {
        Some((section, subsection)) => format!("{section}.{}.{key}", subsection.trim_matches('"')),
        None => format!("{section}.{key}"),
    }
}

fn quote(value: &str) -> String {
    let needs_quotes = value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';']);

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }

    match needs_quotes {
        true => format!("\"{escaped}\""),
        false => escaped,
    }
}

struct Parser<'a> {
    path: &'a Path,
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        Self {
            path,
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CoreError {
        CoreError::ConfigSyntax {
            path: PathBuf::from(self.path),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_blanks(&mut self) {
        while matches!(self.chars.peek(), Some(' ' | '\t' | '\r')) {
            self.next();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.next() {
            if c == '\n' {
                break;
            }
        }
    }

    /// After a header or value only blanks and a comment may follow
    fn expect_line_end(&mut self) -> Result<()> {
        self.skip_blanks();
        match self.chars.peek().copied() {
            None => Ok(()),
            Some('\n' | '#' | ';') => {
                self.skip_line();
                Ok(())
            }
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
        }
    }

    fn parse(mut self) -> Result<ConfigLayer> {
        let mut layer = ConfigLayer::default();
        let mut current: Option<String> = None;

        loop {
            self.skip_blanks();
            match self.chars.peek().copied() {
                None => break,
                Some('\n') => {
                    self.next();
                }
                Some('#' | ';') => self.skip_line(),
                Some('[') => {
                    self.next();
                    let section = self.parse_header()?;
                    layer.sections.entry(section.clone()).or_default();
                    current = Some(section);
                    self.expect_line_end()?;
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    let section = current
                        .clone()
                        .ok_or_else(|| self.error("key outside of any section"))?;
                    let key = self.parse_key();

                    self.skip_blanks();
                    let value = match self.chars.peek().copied() {
                        Some('=') => {
                            self.next();
                            self.parse_value()?
                        }
                        None | Some('\n' | '#' | ';') => {
                            self.skip_line();
                            String::from("true")
                        }
                        Some(c) => {
                            return Err(self.error(format!("expected '=' after {key:?}, found {c:?}")));
                        }
                    };

                    layer.append(&section, &key, &value);
                }
                Some(c) => return Err(self.error(format!("unexpected character {c:?}"))),
            }
        }

        Ok(layer)
    }

    fn parse_header(&mut self) -> Result<String> {
        let mut name = String::new();
        loop {
            match self.chars.peek().copied() {
                Some(']') => {
                    self.next();
                    return self.valid_section_name(name);
                }
                Some('"') => {
                    self.next();
                    let subsection = self.parse_subsection()?;
                    self.skip_blanks();
                    if self.next() != Some(']') {
                        return Err(self.error("expected ']' after subsection"));
                    }
                    let name = self.valid_section_name(name)?;
                    return Ok(format!("{name} \"{subsection}\""));
                }
                Some(c) if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ' ' | '\t') => {
                    self.next();
                    name.push(c);
                }
                _ => return Err(self.error("malformed section header")),
            }
        }
    }

    fn valid_section_name(&self, name: String) -> Result<String> {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(self.error(format!("invalid section name {name:?}")));
        }
        Ok(name.to_string())
    }

    fn parse_subsection(&mut self) -> Result<String> {
        let mut subsection = String::new();
        loop {
            match self.next() {
                Some('"') => return Ok(subsection),
                Some('\\') => match self.next() {
                    Some(c) if c != '\n' => subsection.push(c),
                    _ => return Err(self.error("unterminated subsection name")),
                },
                Some('\n') | None => return Err(self.error("unterminated subsection name")),
                Some(c) => subsection.push(c),
            }
        }
    }

    fn parse_key(&mut self) -> String {
        let mut key = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '-') {
                break;
            }
            key.push(c);
            self.next();
        }
        key
    }

    fn parse_value(&mut self) -> Result<String> {
        self.skip_blanks();

        let mut value = String::new();
        // length of the value without trailing unquoted whitespace
        let mut kept = 0;
        let mut quoted = false;

        loop {
            match self.chars.peek().copied() {
                None | Some('\n') => {
                    if quoted {
                        return Err(self.error("unterminated quoted value"));
                    }
                    self.next();
                    break;
                }
                Some('#' | ';') if !quoted => {
                    self.skip_line();
                    break;
                }
                Some('"') => {
                    self.next();
                    quoted = !quoted;
                    kept = value.len();
                }
                Some('\\') => {
                    self.next();
                    match self.next() {
                        // line continuation
                        Some('\n') => continue,
                        Some('\r') if self.chars.peek() == Some(&'\n') => {
                            self.next();
                            continue;
                        }
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('b') => value.push('\u{8}'),
                        Some(c @ ('"' | '\\')) => value.push(c),
                        Some(c) => return Err(self.error(format!("invalid escape \\{c}"))),
                        None => return Err(self.error("dangling backslash")),
                    }
                    kept = value.len();
                }
                Some(c) => {
                    self.next();
                    value.push(c);
                    if quoted || !c.is_whitespace() {
                        kept = value.len();
                    }
                }
            }
        }

        value.truncate(kept);
        Ok(value)
    }
}
