//! Directory entry types returned by volume listings.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// The `..` marker some listings include.
    ParentMarker,
}

/// A single entry of a volume directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: CompactString,
    /// Entry type.
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time, if the volume reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl DirEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<CompactString>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            modified: None,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            modified: None,
        }
    }

    /// Create a parent marker entry.
    pub fn parent_marker() -> Self {
        Self {
            name: CompactString::new(".."),
            kind: EntryKind::ParentMarker,
            size: 0,
            modified: None,
        }
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_parent_marker(&self) -> bool {
        self.kind == EntryKind::ParentMarker
    }
}
