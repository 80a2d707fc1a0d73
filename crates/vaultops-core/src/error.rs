//! Error types for volume access and whole-file loading.

use thiserror::Error;

/// Errors raised by volume backends outside the item-level protocol.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The volume has been closed.
    #[error("Volume is closed")]
    Closed,

    /// The directory is not a volume root.
    #[error("Not a volume: {path}")]
    NotAVolume { path: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl VolumeError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Outcomes of materializing a whole volume file in memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The volume could not report the file size.
    #[error("Unable to determine file size")]
    SizeUnavailable,

    /// The file is bigger than the caller allows.
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// The buffer for the file could not be allocated.
    #[error("Out of memory allocating {size} bytes")]
    OutOfMemory { size: u64 },

    /// The file could not be opened for reading.
    #[error("Unable to open file")]
    OpenFailed,

    /// The stream ended before the declared size was read.
    #[error("Incomplete read: expected {expected} bytes, got {read}")]
    IncompleteRead { expected: u64, read: u64 },
}
