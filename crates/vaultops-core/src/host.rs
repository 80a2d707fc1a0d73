//! Unencrypted host-side trees and the external secure wiper.

use std::fmt::Debug;
use std::io::{self, Read, Write};

/// A tree of plain files the engine imports from or exports to.
///
/// Nodes are cheap handles (paths, URIs) rather than open resources.
pub trait HostTree: Send + Sync {
    type Node: Clone + Debug + Send + Sync;

    /// Name of the node within its parent, if it has one.
    fn name(&self, node: &Self::Node) -> Option<String>;

    fn is_dir(&self, node: &Self::Node) -> bool;

    fn is_file(&self, node: &Self::Node) -> bool;

    /// Length of a file node in bytes.
    fn size(&self, node: &Self::Node) -> u64;

    /// Children of a directory node.
    fn children(&self, node: &Self::Node) -> io::Result<Vec<Self::Node>>;

    fn open_read(&self, node: &Self::Node) -> io::Result<Box<dyn Read + Send>>;

    /// Create a directory named `name` under `parent`.
    fn create_dir(&self, parent: &Self::Node, name: &str) -> io::Result<Self::Node>;

    /// Create an empty file named `name` under `parent`.
    fn create_file(&self, parent: &Self::Node, name: &str) -> io::Result<Self::Node>;

    fn open_write(&self, node: &Self::Node) -> io::Result<Box<dyn Write + Send>>;

    fn delete(&self, node: &Self::Node) -> io::Result<()>;

    /// Stable textual reference used when reporting a node to the user.
    fn reference(&self, node: &Self::Node) -> String;
}

/// External secure-delete of a single host artifact.
pub trait SecureWiper<H: HostTree + ?Sized>: Send + Sync {
    /// Destroy `node`. The error is a message meant for the user.
    fn wipe(&self, host: &H, node: &H::Node) -> Result<(), String>;
}
