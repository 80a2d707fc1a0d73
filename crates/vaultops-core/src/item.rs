//! Operation requests and results.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Identifier of one operation session, from start to sink close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a new SessionId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of bulk operation, used as the progress title.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum OperationKind {
    Copy,
    Move,
    Import,
    Export,
    Wipe,
    CopyVolume,
}

impl OperationKind {
    /// Human-readable progress title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Copy => "Copying files",
            Self::Move => "Moving files",
            Self::Import => "Importing files",
            Self::Export => "Exporting files",
            Self::Wipe => "Wiping files",
            Self::CopyVolume => "Copying volume",
        }
    }
}

/// One source/destination pair selected by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationItem {
    /// Full path of the source inside its volume.
    pub source: String,
    /// Full destination path, when the operation needs one.
    pub destination: Option<String>,
    /// Whether the source is a directory.
    pub is_directory: bool,
}

impl OperationItem {
    /// A file item with a destination.
    pub fn file(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: Some(destination.into()),
            is_directory: false,
        }
    }

    /// A directory item with a destination.
    pub fn directory(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: Some(destination.into()),
            is_directory: true,
        }
    }

    /// An item without a destination (exports, for example).
    pub fn source_only(source: impl Into<String>, is_directory: bool) -> Self {
        Self {
            source: source.into(),
            destination: None,
            is_directory,
        }
    }
}

/// Result of a traversal: either nothing failed, or exactly one item did.
///
/// Cancellation is never a failure: a cancelled result has no failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult<T> {
    /// The operation stopped early on request.
    pub cancelled: bool,
    /// The first item that could not be processed.
    pub failed_item: Option<T>,
}

impl<T> TaskResult<T> {
    /// Every item was processed.
    pub fn completed() -> Self {
        Self {
            cancelled: false,
            failed_item: None,
        }
    }

    /// The operation stopped at `item`.
    pub fn failed(item: T) -> Self {
        Self {
            cancelled: false,
            failed_item: Some(item),
        }
    }

    /// The operation was cancelled before finishing.
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            failed_item: None,
        }
    }

    /// Build from an optional failure.
    pub fn from_failure(failed_item: Option<T>) -> Self {
        Self {
            cancelled: false,
            failed_item,
        }
    }

    /// No item failed (includes cancellation).
    pub fn is_success(&self) -> bool {
        self.failed_item.is_none()
    }

    /// Convert the failed item.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskResult<U> {
        TaskResult {
            cancelled: self.cancelled,
            failed_item: self.failed_item.map(f),
        }
    }
}
