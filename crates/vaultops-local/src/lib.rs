//! Local filesystem adapters for vaultops.
//!
//! - [`DirVolume`] stores a volume's files in a plain host directory, behind
//!   the same handle-based interface the engine uses for native volumes.
//! - [`FsHostTree`] exposes `std::fs` as a [`HostTree`](vaultops_core::HostTree).
//! - [`OverwriteWiper`] zero-fills host files before unlinking them.

mod host;
mod volume;
mod wiper;

pub use host::FsHostTree;
pub use volume::{DirVolume, LocalVolume, VolumeHeader};
pub use wiper::{collect_files, OverwriteWiper};
