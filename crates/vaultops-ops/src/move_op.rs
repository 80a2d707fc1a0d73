//! Move items inside one volume by renaming, merging colliding directories.

use tracing::{debug, warn};
use vaultops_core::{OperationItem, TaskResult, Volume};

use crate::context::OperationContext;

/// Source directories whose destination already existed.
///
/// Their children are moved by their own items; the emptied sources are
/// removed once every rename has succeeded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryMergePlan {
    deferred: Vec<String>,
}

impl DirectoryMergePlan {
    pub fn defer(&mut self, source: String) {
        self.deferred.push(source);
    }

    pub fn len(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }

    /// Deferred directories, deepest first.
    ///
    /// Items arrive with every directory before its descendants, so the
    /// reverse order empties children before their parents.
    pub fn removal_order(&self) -> impl Iterator<Item = &str> {
        self.deferred.iter().rev().map(String::as_str)
    }
}

/// Move `items` within `volume`.
///
/// Every item is renamed in order, except directories whose destination
/// already exists: those are merged, and removed after all renames
/// succeeded. Merge removals count toward the same total, so progress ends
/// at `items.len()`.
pub fn move_items(
    ctx: &OperationContext,
    items: &[OperationItem],
    volume: &dyn Volume,
) -> TaskResult<String> {
    let total = items.len();
    let mut done = 0;
    let mut merges = DirectoryMergePlan::default();

    for item in items {
        if ctx.is_cancelled() {
            return TaskResult::cancelled();
        }

        let Some(destination) = item.destination.as_deref() else {
            warn!(path = %item.source, "move item has no destination");
            return TaskResult::failed(item.source.clone());
        };

        if item.is_directory && volume.exists(destination) {
            debug!(path = %item.source, destination, "deferring directory merge");
            merges.defer(item.source.clone());
            continue;
        }

        if !volume.rename(&item.source, destination) {
            warn!(path = %item.source, destination, "rename failed");
            return TaskResult::failed(item.source.clone());
        }

        done += 1;
        ctx.report(done, total);
    }

    for dir in merges.removal_order() {
        if ctx.is_cancelled() {
            return TaskResult::cancelled();
        }

        if !volume.rmdir(dir) {
            warn!(path = dir, "cannot remove merged directory");
            return TaskResult::failed(dir.to_string());
        }

        done += 1;
        ctx.report(done, total);
    }

    TaskResult::completed()
}
