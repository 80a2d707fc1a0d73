//! Cancellable bulk file operations for vaultops.
//!
//! This crate runs copy, move, import, export, wipe and volume duplication
//! as background units of work supervised by a [`TaskSupervisor`]. Each
//! operation processes its items strictly in order, reports progress to a
//! [`ProgressSink`] after every item, polls for cancellation once per item,
//! and stops at the first item that fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultops_core::{OperationItem, OpsConfig, Volume};
//! use vaultops_ops::{LogSink, OperationExecutor, TaskSupervisor};
//!
//! # async fn demo(volume: Arc<dyn Volume>) {
//! let supervisor = Arc::new(TaskSupervisor::new(LogSink, OpsConfig::default()));
//! let executor = OperationExecutor::new(supervisor, volume);
//!
//! let running = executor.copy(vec![OperationItem::file("/a.txt", "/b.txt")], None);
//! let id = running.id(); // executor.cancel(id) stops it early
//! let result = running.wait().await.unwrap();
//! assert!(result.failed_item.is_none());
//! # }
//! ```

mod context;
mod copy;
mod copy_volume;
mod error;
mod executor;
mod export;
mod import;
mod move_op;
mod outcome;
mod progress;
mod supervisor;
mod transfer;
mod tree;
mod wipe;

pub use context::OperationContext;
pub use copy::copy_items;
pub use copy_volume::{copy_volume, count_descendants, CopyVolumeOutcome};
pub use error::{OpsError, OpsResult};
pub use executor::{OperationExecutor, RunningOperation};
pub use export::export_items;
pub use import::{
    import_directory, import_files, map_directory_for_import, ImportDirectoryOutcome, ImportPlan,
};
pub use move_op::{move_items, DirectoryMergePlan};
pub use outcome::Outcome;
pub use progress::{ChannelSink, LogSink, NullSink, ProgressEvent, ProgressSink};
pub use supervisor::{Session, TaskSupervisor};
pub use transfer::{copy_file, export_file, import_stream, load_whole_file, pipe};
pub use tree::{
    expand_items, expand_move_items, recursive_map_files, recursive_remove_directory,
};
pub use wipe::{wipe_nodes, WipeOutcome};

// Re-export core types for convenience
pub use vaultops_core::{OperationItem, OperationKind, SessionId, TaskResult};
