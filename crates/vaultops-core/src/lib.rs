//! Core types and collaborator interfaces for vaultops.
//!
//! This crate defines the data model shared by the operation engine
//! (items, results, directory entries) together with the narrow interfaces
//! the engine drives: the encrypted [`Volume`], the unencrypted
//! [`HostTree`], and the external [`SecureWiper`].

mod config;
mod entry;
mod error;
mod host;
mod item;
mod path;
mod volume;

pub use config::{
    OpsConfig, OpsConfigBuilder, OpsConfigBuilderError, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_DEPTH,
};
pub use entry::{DirEntry, EntryKind};
pub use error::{LoadError, VolumeError};
pub use host::{HostTree, SecureWiper};
pub use item::{OperationItem, OperationKind, SessionId, TaskResult};
pub use path::{file_name, is_volume_root, parent_path, path_join};
pub use volume::{FileHandle, SharedVolume, Volume, VolumeBackend};
