//! `std::fs` as a host tree.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use vaultops_core::HostTree;

/// The local filesystem. Nodes are absolute or relative paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHostTree;

impl FsHostTree {
    pub fn new() -> Self {
        Self
    }
}

fn child_path(parent: &Path, name: &str) -> io::Result<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid entry name {name:?}"),
        ));
    }
    Ok(parent.join(name))
}

impl HostTree for FsHostTree {
    type Node = PathBuf;

    fn name(&self, node: &PathBuf) -> Option<String> {
        node.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    fn is_dir(&self, node: &PathBuf) -> bool {
        node.is_dir()
    }

    fn is_file(&self, node: &PathBuf) -> bool {
        node.is_file()
    }

    fn size(&self, node: &PathBuf) -> u64 {
        fs::metadata(node).map(|m| m.len()).unwrap_or(0)
    }

    /// Children sorted by name, so walks are reproducible.
    fn children(&self, node: &PathBuf) -> io::Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(node)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        Ok(children)
    }

    fn open_read(&self, node: &PathBuf) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(node)?))
    }

    fn create_dir(&self, parent: &PathBuf, name: &str) -> io::Result<PathBuf> {
        let path = child_path(parent, name)?;
        fs::create_dir(&path)?;
        debug!(path = %path.display(), "created host directory");
        Ok(path)
    }

    fn create_file(&self, parent: &PathBuf, name: &str) -> io::Result<PathBuf> {
        let path = child_path(parent, name)?;
        OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(path)
    }

    fn open_write(&self, node: &PathBuf) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().write(true).truncate(true).open(node)?;
        Ok(Box::new(io::BufWriter::new(file)))
    }

    fn delete(&self, node: &PathBuf) -> io::Result<()> {
        if fs::symlink_metadata(node)?.is_dir() {
            fs::remove_dir_all(node)
        } else {
            fs::remove_file(node)
        }
    }

    fn reference(&self, node: &PathBuf) -> String {
        format!("file://{}", node.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let host = FsHostTree::new();
        let root = dir.path().to_path_buf();

        let sub = host.create_dir(&root, "b").unwrap();
        let file = host.create_file(&root, "a.txt").unwrap();
        host.open_write(&file).unwrap().write_all(b"abc").unwrap();

        assert_eq!(host.children(&root).unwrap(), vec![file.clone(), sub]);
        assert_eq!(host.size(&file), 3);
        assert_eq!(host.name(&file).as_deref(), Some("a.txt"));
        assert!(host.create_file(&root, "a.txt").is_err());
    }

    #[test]
    fn test_rejects_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let host = FsHostTree::new();
        let root = dir.path().to_path_buf();
        assert!(host.create_dir(&root, "..").is_err());
        assert!(host.create_file(&root, "x/y").is_err());
    }

    #[test]
    fn test_delete_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let host = FsHostTree::new();
        let sub = host.create_dir(&dir.path().to_path_buf(), "sub").unwrap();
        host.create_file(&sub, "f").unwrap();
        host.delete(&sub).unwrap();
        assert!(!sub.exists());
    }
}
