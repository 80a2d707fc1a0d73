//! Zero-overwrite secure deletion of host files.

use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use vaultops_core::{HostTree, SecureWiper, DEFAULT_CHUNK_SIZE};

/// Overwrites every byte of a file with zeros, syncs, then unlinks it.
///
/// Directories are wiped file by file and then removed.
#[derive(Debug, Clone, Copy)]
pub struct OverwriteWiper {
    passes: u32,
}

impl Default for OverwriteWiper {
    fn default() -> Self {
        Self { passes: 1 }
    }
}

impl OverwriteWiper {
    pub fn new(passes: u32) -> Self {
        Self {
            passes: passes.max(1),
        }
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    fn overwrite(&self, path: &Path) -> io::Result<()> {
        let len = fs::metadata(path)?.len();
        let mut file = OpenOptions::new().write(true).open(path)?;
        let zeros = [0u8; DEFAULT_CHUNK_SIZE];

        for _ in 0..self.passes {
            file.seek(SeekFrom::Start(0))?;
            let mut remaining = len;
            while remaining > 0 {
                let n = remaining.min(zeros.len() as u64) as usize;
                file.write_all(&zeros[..n])?;
                remaining -= n as u64;
            }
            file.sync_all()?;
        }
        Ok(())
    }

    fn wipe_path(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            for entry in fs::read_dir(path)? {
                self.wipe_path(&entry?.path())?;
            }
            fs::remove_dir(path)
        } else {
            self.overwrite(path)?;
            fs::remove_file(path)
        }
    }
}

impl<H> SecureWiper<H> for OverwriteWiper
where
    H: HostTree<Node = PathBuf> + ?Sized,
{
    fn wipe(&self, host: &H, node: &H::Node) -> Result<(), String> {
        self.wipe_path(node)
            .map_err(|e| format!("Failed to wipe {}: {e}", host.reference(node)))?;
        debug!(path = %node.display(), passes = self.passes, "wiped");
        Ok(())
    }
}

/// Every file below `root`, depth-first with children in name order.
///
/// This is the list a volume wipe destroys before removing the root.
pub fn collect_files<H: HostTree + ?Sized>(host: &H, root: &H::Node) -> io::Result<Vec<H::Node>> {
    let mut files = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(dir) = stack.pop() {
        let children = host.children(&dir)?;
        for child in children.iter().rev() {
            if host.is_dir(child) {
                stack.push(child.clone());
            }
        }
        files.extend(children.into_iter().filter(|c| host.is_file(c)));
    }
    Ok(files)
}
