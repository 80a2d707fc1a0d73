//! Export volume files and directory trees into a host tree.

use tracing::{debug, warn};
use vaultops_core::{file_name, path_join, HostTree, OperationItem, TaskResult, Volume};

use crate::context::OperationContext;
use crate::outcome::Walk;
use crate::transfer;

/// Export `items` from `volume` into the host directory `dest_tree`.
///
/// Directory items are exported recursively. The first failing item stops
/// the export; progress counts top-level items.
pub fn export_items<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    volume: &dyn Volume,
    host: &H,
    dest_tree: &H::Node,
    items: &[OperationItem],
) -> TaskResult<String> {
    let total = items.len();

    for (i, item) in items.iter().enumerate() {
        if ctx.is_cancelled() {
            return TaskResult::cancelled();
        }

        let walk = if item.is_directory {
            export_directory(ctx, volume, host, &item.source, dest_tree, 0)
        } else if export_file_into(ctx, volume, host, &item.source, dest_tree) {
            Walk::Done
        } else {
            Walk::Failed(item.source.clone())
        };

        match walk {
            Walk::Done => ctx.report(i + 1, total),
            other => return other.into_result(),
        }
    }

    TaskResult::completed()
}

/// Create a host file named after `src_path` in `tree` and stream into it.
fn export_file_into<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    volume: &dyn Volume,
    host: &H,
    src_path: &str,
    tree: &H::Node,
) -> bool {
    let created = host
        .create_file(tree, file_name(src_path))
        .and_then(|node| host.open_write(&node));

    match created {
        Ok(mut writer) => transfer::export_file(volume, src_path, &mut *writer, ctx.chunk_size()),
        Err(e) => {
            debug!(path = src_path, error = %e, "cannot create host file");
            false
        }
    }
}

/// Depth-first export of `dir_path` as a new directory inside `tree`.
///
/// When the destination directory itself cannot be created, the failure is
/// reported as the name of `tree`: there is no source path to blame.
fn export_directory<H: HostTree + ?Sized>(
    ctx: &OperationContext,
    volume: &dyn Volume,
    host: &H,
    dir_path: &str,
    tree: &H::Node,
    depth: usize,
) -> Walk<String> {
    if depth > ctx.config().max_depth {
        warn!(path = dir_path, depth, "export tree too deep");
        return Walk::Failed(dir_path.to_string());
    }

    let child_tree = match host.create_dir(tree, file_name(dir_path)) {
        Ok(node) => node,
        Err(e) => {
            let name = host.name(tree).unwrap_or_else(|| host.reference(tree));
            warn!(destination = %name, error = %e, "cannot create host directory");
            return Walk::Failed(name);
        }
    };

    let entries = match volume.list_dir(dir_path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = dir_path, error = %e, "cannot list volume directory");
            return Walk::Failed(dir_path.to_string());
        }
    };

    for entry in entries.iter().filter(|e| !e.is_parent_marker()) {
        if ctx.is_cancelled() {
            return Walk::Cancelled;
        }

        let full_path = path_join(dir_path, &entry.name);
        if entry.is_dir() {
            match export_directory(ctx, volume, host, &full_path, &child_tree, depth + 1) {
                Walk::Done => {}
                other => return other,
            }
        } else if !export_file_into(ctx, volume, host, &full_path, &child_tree) {
            warn!(path = %full_path, "export failed");
            return Walk::Failed(full_path);
        }
    }

    Walk::Done
}
