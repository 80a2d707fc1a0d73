//! Copy items between volumes, merging into existing directories.

use tracing::{debug, warn};
use vaultops_core::{OperationItem, TaskResult, Volume};

use crate::context::OperationContext;
use crate::transfer::copy_file;

/// Copy `items` from `src` into `dst`, which may be the same volume.
///
/// Directory items are created only when absent, so copying onto an
/// existing tree merges into it. Items are processed in order and the first
/// one that fails stops the copy. Each item must carry a destination.
pub fn copy_items(
    ctx: &OperationContext,
    items: &[OperationItem],
    src: &dyn Volume,
    dst: &dyn Volume,
) -> TaskResult<String> {
    let total = items.len();

    for (i, item) in items.iter().enumerate() {
        if ctx.is_cancelled() {
            return TaskResult::cancelled();
        }

        let Some(destination) = item.destination.as_deref() else {
            warn!(path = %item.source, "copy item has no destination");
            return TaskResult::failed(item.source.clone());
        };

        let success = if item.is_directory {
            if dst.exists(destination) {
                debug!(path = destination, "merging into existing directory");
                true
            } else {
                dst.mkdir(destination)
            }
        } else {
            copy_file(src, &item.source, dst, destination, ctx.chunk_size())
        };

        if !success {
            warn!(path = %item.source, destination, "copy failed");
            return TaskResult::failed(item.source.clone());
        }

        ctx.report(i + 1, total);
    }

    TaskResult::completed()
}
