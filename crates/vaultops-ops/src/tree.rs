//! Recursive helpers over a volume's directory tree.

use tracing::warn;
use vaultops_core::{path_join, DirEntry, OperationItem, Volume, VolumeError};

/// Every entry below `dir`, with its full path.
///
/// A directory's own entries come first, then each subdirectory's
/// expansion, so every directory precedes its descendants. Parent markers
/// are skipped.
pub fn recursive_map_files(
    volume: &dyn Volume,
    dir: &str,
) -> Result<Vec<(String, DirEntry)>, VolumeError> {
    let mut result = Vec::new();
    map_into(volume, dir, &mut result)?;
    Ok(result)
}

fn map_into(
    volume: &dyn Volume,
    dir: &str,
    result: &mut Vec<(String, DirEntry)>,
) -> Result<(), VolumeError> {
    let entries: Vec<(String, DirEntry)> = volume
        .list_dir(dir)?
        .into_iter()
        .filter(|e| !e.is_parent_marker())
        .map(|e| (path_join(dir, &e.name), e))
        .collect();

    let subdirs: Vec<String> = entries
        .iter()
        .filter(|(_, e)| e.is_dir())
        .map(|(path, _)| path.clone())
        .collect();

    result.extend(entries);
    for subdir in subdirs {
        map_into(volume, &subdir, result)?;
    }
    Ok(())
}

/// Expand a copy of `source` to `destination` into per-entry items.
///
/// The first item is `source` itself; the rest follow the order of
/// [`recursive_map_files`], with destinations rebased under `destination`.
pub fn expand_items(
    volume: &dyn Volume,
    source: &str,
    destination: &str,
    is_directory: bool,
) -> Result<Vec<OperationItem>, VolumeError> {
    if !is_directory {
        return Ok(vec![OperationItem::file(source, destination)]);
    }

    let mut items = vec![OperationItem::directory(source, destination)];
    let prefix = source.trim_end_matches('/');
    for (path, entry) in recursive_map_files(volume, source)? {
        let relative = path.strip_prefix(prefix).unwrap_or(&path);
        let target = path_join(destination, relative);
        items.push(OperationItem {
            source: path,
            destination: Some(target),
            is_directory: entry.is_dir(),
        });
    }
    Ok(items)
}

/// Expand a move of `source` to `destination` into rename items.
///
/// A directory whose destination does not exist yet moves as a single
/// rename. One whose destination exists is merged: its item is kept, and
/// each child is expanded the same way against the matching destination.
pub fn expand_move_items(
    volume: &dyn Volume,
    source: &str,
    destination: &str,
    is_directory: bool,
) -> Result<Vec<OperationItem>, VolumeError> {
    let mut items = Vec::new();
    expand_move_into(volume, source, destination, is_directory, &mut items)?;
    Ok(items)
}

fn expand_move_into(
    volume: &dyn Volume,
    source: &str,
    destination: &str,
    is_directory: bool,
    items: &mut Vec<OperationItem>,
) -> Result<(), VolumeError> {
    if !is_directory {
        items.push(OperationItem::file(source, destination));
        return Ok(());
    }

    items.push(OperationItem::directory(source, destination));
    if !volume.exists(destination) {
        return Ok(());
    }

    for entry in volume.list_dir(source)? {
        if entry.is_parent_marker() {
            continue;
        }
        expand_move_into(
            volume,
            &path_join(source, &entry.name),
            &path_join(destination, &entry.name),
            entry.is_dir(),
            items,
        )?;
    }
    Ok(())
}

/// Remove `dir` and everything below it, depth-first.
///
/// Returns the first path that could not be removed, if any.
pub fn recursive_remove_directory(volume: &dyn Volume, dir: &str) -> Option<String> {
    let entries = match volume.list_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = dir, error = %e, "cannot list directory for removal");
            return Some(dir.to_string());
        }
    };

    for entry in entries.iter().filter(|e| !e.is_parent_marker()) {
        let full_path = path_join(dir, &entry.name);
        if entry.is_dir() {
            if let Some(failed) = recursive_remove_directory(volume, &full_path) {
                return Some(failed);
            }
        } else if !volume.remove_file(&full_path) {
            return Some(full_path);
        }
    }

    if volume.rmdir(dir) {
        None
    } else {
        Some(dir.to_string())
    }
}
