//! Per-file revision records and the `Entries` admin-line format
//!
//! Each version-controlled file is described by one line of the admin
//! `Entries` file:
//!
//! ```text
//! /name/revision/timestamp/options/tagdate
//! D/name////
//! ```
//!
//! The trailing field carries the sticky tag (`Tbranch`) or sticky date
//! (`D2024.01.01...`) when present.

use serde::{Deserialize, Serialize};

/// Metadata for one file's version-control state within a directory.
///
/// Records are keyed by [`file_name`](Self::file_name); a directory holds at
/// most one record per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// File name, unique within the owning directory
    pub file_name: String,
    /// Revision string (`1.2`); `0` for an added file, `-1.2` for a removed one
    pub revision: String,
    /// Timestamp field as recorded by the client (not interpreted here)
    pub timestamp: String,
    /// Keyword-expansion options (`-kb` and friends)
    pub options: String,
    /// Sticky tag or date, including its `T`/`D` prefix
    pub sticky: Option<String>,
    /// Whether this record describes a subdirectory
    pub directory: bool,
}

impl EntryRecord {
    /// Create a plain file record with just a name and revision
    pub fn file(file_name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            revision: revision.into(),
            timestamp: String::new(),
            options: String::new(),
            sticky: None,
            directory: false,
        }
    }

    /// Create a subdirectory record
    pub fn subdirectory(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            revision: String::new(),
            timestamp: String::new(),
            options: String::new(),
            sticky: None,
            directory: true,
        }
    }

    /// Parse one `Entries` line; returns `None` for blank or malformed lines.
    ///
    /// Readers skip unparsable lines rather than failing the whole
    /// directory, so a damaged admin file degrades to fewer records.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }

        let (directory, rest) = match line.strip_prefix('D') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        // A bare "D" line marks "no subdirectories", not an entry.
        if rest.is_empty() {
            return None;
        }

        let mut fields = rest.strip_prefix('/')?.split('/');
        let file_name = fields.next()?;
        if file_name.is_empty() {
            return None;
        }
        let revision = fields.next()?;
        let timestamp = fields.next().unwrap_or_default();
        let options = fields.next().unwrap_or_default();
        let tag_field = fields.next().unwrap_or_default();

        Some(Self {
            file_name: file_name.to_string(),
            revision: revision.to_string(),
            timestamp: timestamp.to_string(),
            options: options.to_string(),
            sticky: if tag_field.is_empty() {
                None
            } else {
                Some(tag_field.to_string())
            },
            directory,
        })
    }

    /// Format this record back into its `Entries` line form
    pub fn format_line(&self) -> String {
        let prefix = if self.directory { "D" } else { "" };
        format!(
            "{}/{}/{}/{}/{}/{}",
            prefix,
            self.file_name,
            self.revision,
            self.timestamp,
            self.options,
            self.sticky.as_deref().unwrap_or_default()
        )
    }

    /// File scheduled for addition but not yet committed
    pub fn is_added(&self) -> bool {
        self.revision == "0"
    }

    /// File scheduled for removal
    pub fn is_removed(&self) -> bool {
        self.revision.starts_with('-')
    }

    /// Revision with the removal marker stripped
    pub fn base_revision(&self) -> &str {
        self.revision.strip_prefix('-').unwrap_or(&self.revision)
    }

    /// Sticky tag name without its `T` prefix, if the sticky field is a tag
    pub fn sticky_tag(&self) -> Option<&str> {
        self.sticky.as_deref()?.strip_prefix('T')
    }
}
