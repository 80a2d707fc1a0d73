#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use vaultops_core::{
    parent_path, DirEntry, FileHandle, HostTree, OpsConfig, SecureWiper, SessionId, Volume,
    VolumeError,
};
use vaultops_ops::{ChannelSink, OperationContext, ProgressEvent};

/// Context plus the receiver of everything it reported.
pub fn context() -> (OperationContext, CancellationToken, UnboundedReceiver<ProgressEvent>) {
    context_with(OpsConfig::default())
}

pub fn context_with(
    config: OpsConfig,
) -> (OperationContext, CancellationToken, UnboundedReceiver<ProgressEvent>) {
    let (sink, rx) = ChannelSink::new();
    let token = CancellationToken::new();
    let ctx = OperationContext::new(
        SessionId::new(1),
        token.clone(),
        Arc::new(sink),
        Arc::new(config),
    );
    (ctx, token, rx)
}

/// `(done, total)` of every progress event received so far.
pub fn progress_updates(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<(usize, usize)> {
    let mut updates = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Progress { done, total, .. } = event {
            updates.push((done, total));
        }
    }
    updates
}

#[derive(Debug, Clone)]
enum MemNode {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct MemState {
    nodes: BTreeMap<String, MemNode>,
    handles: HashMap<u32, String>,
    next_handle: u32,
    closed: bool,
    actions: Vec<String>,
    failing: HashSet<String>,
    short_writes: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl MemState {
    fn record(&mut self, action: &str, path: &str) -> bool {
        self.actions.push(format!("{action} {path}"));
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == path {
                token.cancel();
            }
        }
        !self.failing.contains(path)
    }
}

/// In-memory volume with an action log and failure injection.
#[derive(Default)]
pub struct MemVolume {
    state: Mutex<MemState>,
}

impl MemVolume {
    pub fn new() -> Self {
        let volume = Self::default();
        volume.state.lock().unwrap().nodes.insert("/".to_string(), MemNode::Dir);
        volume
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().nodes.insert(path.to_string(), MemNode::Dir);
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.to_string(), MemNode::File(data.to_vec()));
        self
    }

    /// Every action touching `path` fails.
    pub fn fail_on(&self, path: &str) {
        self.state.lock().unwrap().failing.insert(path.to_string());
    }

    /// Writes to `path` store one byte less than asked.
    pub fn short_write_on(&self, path: &str) {
        self.state.lock().unwrap().short_writes.insert(path.to_string());
    }

    /// Cancel `token` when an action touches `path`.
    pub fn cancel_on(&self, path: &str, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on = Some((path.to_string(), token));
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state.lock().unwrap().actions.clear();
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(MemNode::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state.lock().unwrap().nodes.get(path), Some(MemNode::Dir))
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().handles.len()
    }
}

fn children_of<'a>(
    nodes: &'a BTreeMap<String, MemNode>,
    dir: &'a str,
) -> impl Iterator<Item = (&'a String, &'a MemNode)> + 'a {
    nodes
        .iter()
        .filter(move |(path, _)| path.as_str() != "/" && parent_path(path) == Some(dir))
}

impl Volume for MemVolume {
    fn open_read(&self, path: &str) -> Option<FileHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.record("open_read", path) || state.closed {
            return None;
        }
        if !matches!(state.nodes.get(path), Some(MemNode::File(_))) {
            return None;
        }
        state.next_handle += 1;
        let id = state.next_handle;
        state.handles.insert(id, path.to_string());
        Some(FileHandle(id))
    }

    fn open_write(&self, path: &str) -> Option<FileHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.record("open_write", path) || state.closed {
            return None;
        }
        let parent_ok = parent_path(path)
            .map(|p| matches!(state.nodes.get(p), Some(MemNode::Dir)))
            .unwrap_or(false);
        if !parent_ok || matches!(state.nodes.get(path), Some(MemNode::Dir)) {
            return None;
        }
        state
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| MemNode::File(Vec::new()));
        state.next_handle += 1;
        let id = state.next_handle;
        state.handles.insert(id, path.to_string());
        Some(FileHandle(id))
    }

    fn read(&self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> isize {
        let state = self.state.lock().unwrap();
        let Some(path) = state.handles.get(&handle.0) else {
            return -1;
        };
        let Some(MemNode::File(data)) = state.nodes.get(path) else {
            return -1;
        };
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        n as isize
    }

    fn write(&self, handle: FileHandle, offset: u64, buf: &[u8]) -> isize {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.handles.get(&handle.0).cloned() else {
            return -1;
        };
        let len = if state.short_writes.contains(&path) {
            buf.len().saturating_sub(1)
        } else {
            buf.len()
        };
        let Some(MemNode::File(data)) = state.nodes.get_mut(&path) else {
            return -1;
        };
        let end = offset as usize + len;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(&buf[..len]);
        len as isize
    }

    fn truncate(&self, handle: FileHandle, offset: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(path) = state.handles.get(&handle.0).cloned() else {
            return false;
        };
        match state.nodes.get_mut(&path) {
            Some(MemNode::File(data)) => {
                data.truncate(offset as usize);
                true
            }
            _ => false,
        }
    }

    fn close_file(&self, handle: FileHandle) {
        self.state.lock().unwrap().handles.remove(&handle.0);
    }

    fn mkdir(&self, path: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.record("mkdir", path) || state.nodes.contains_key(path) {
            return false;
        }
        let parent_ok = parent_path(path)
            .map(|p| matches!(state.nodes.get(p), Some(MemNode::Dir)))
            .unwrap_or(false);
        if !parent_ok {
            return false;
        }
        state.nodes.insert(path.to_string(), MemNode::Dir);
        true
    }

    fn rmdir(&self, path: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.record("rmdir", path) {
            return false;
        }
        if !matches!(state.nodes.get(path), Some(MemNode::Dir)) {
            return false;
        }
        if children_of(&state.nodes, path).next().is_some() {
            return false;
        }
        state.nodes.remove(path);
        true
    }

    fn remove_file(&self, path: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.record("remove", path) {
            return false;
        }
        match state.nodes.get(path) {
            Some(MemNode::File(_)) => state.nodes.remove(path).is_some(),
            _ => false,
        }
    }

    fn rename(&self, old_path: &str, new_path: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.record("rename", old_path) || state.nodes.contains_key(new_path) {
            return false;
        }
        if !state.nodes.contains_key(old_path) {
            return false;
        }
        let prefix = format!("{old_path}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| k.as_str() == old_path || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let new_key = format!("{new_path}{}", &key[old_path.len()..]);
                state.nodes.insert(new_key, node);
            }
        }
        true
    }

    fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    fn size(&self, path: &str) -> Option<u64> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(MemNode::File(data)) => Some(data.len() as u64),
            _ => None,
        }
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, VolumeError> {
        let mut state = self.state.lock().unwrap();
        if !state.record("list", path) {
            return Err(VolumeError::io(
                path,
                io::Error::new(io::ErrorKind::PermissionDenied, "injected"),
            ));
        }
        if !matches!(state.nodes.get(path), Some(MemNode::Dir)) {
            return Err(VolumeError::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            ));
        }
        let mut entries = vec![DirEntry::parent_marker()];
        for (child, node) in children_of(&state.nodes, path) {
            let name = vaultops_core::file_name(child);
            entries.push(match node {
                MemNode::Dir => DirEntry::directory(name),
                MemNode::File(data) => DirEntry::file(name, data.len() as u64),
            });
        }
        Ok(entries)
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.handles.clear();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[derive(Debug, Clone)]
enum HostEntry {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct HostState {
    entries: BTreeMap<String, HostEntry>,
    failing: HashSet<String>,
    short_reads: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
    actions: Vec<String>,
}

/// In-memory host tree. Nodes are `/`-separated paths.
#[derive(Clone, Default)]
pub struct MemHost {
    state: Arc<Mutex<HostState>>,
}

impl MemHost {
    pub fn new() -> Self {
        let host = Self::default();
        host.state.lock().unwrap().entries.insert("/".to_string(), HostEntry::Dir);
        host
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().entries.insert(path.to_string(), HostEntry::Dir);
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(path.to_string(), HostEntry::File(data.to_vec()));
        self
    }

    pub fn fail_on(&self, path: &str) {
        self.state.lock().unwrap().failing.insert(path.to_string());
    }

    /// Reads of `path` stop one byte before its end.
    pub fn short_read_on(&self, path: &str) {
        self.state.lock().unwrap().short_reads.insert(path.to_string());
    }

    /// Cancel `token` when an action touches `path`.
    pub fn cancel_on(&self, path: &str, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on = Some((path.to_string(), token));
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().entries.get(path) {
            Some(HostEntry::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(path)
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    /// Paths of every entry below `root`, in sorted order.
    pub fn tree(&self, root: &str) -> Vec<String> {
        let prefix = format!("{}/", root.trim_end_matches('/'));
        self.state
            .lock()
            .unwrap()
            .entries
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| k[prefix.len()..].to_string())
            .collect()
    }

    fn check(&self, action: &str, path: &str) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("{action} {path}"));
        if let Some((trigger, token)) = &state.cancel_on {
            if trigger == path {
                token.cancel();
            }
        }
        if state.failing.contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected"));
        }
        Ok(())
    }

    fn create(&self, parent: &String, name: &str, entry: HostEntry) -> io::Result<String> {
        let path = vaultops_core::path_join(parent, name);
        self.check("create", &path)?;
        let mut state = self.state.lock().unwrap();
        if !matches!(state.entries.get(parent.as_str()), Some(HostEntry::Dir)) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no parent"));
        }
        if state.entries.contains_key(&path) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "exists"));
        }
        state.entries.insert(path.clone(), entry);
        Ok(path)
    }
}

struct MemWriter {
    state: Arc<Mutex<HostState>>,
    path: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        match state.entries.get_mut(&self.path) {
            Some(HostEntry::File(data)) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "gone")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl HostTree for MemHost {
    type Node = String;

    fn name(&self, node: &String) -> Option<String> {
        let name = vaultops_core::file_name(node);
        (!name.is_empty()).then(|| name.to_string())
    }

    fn is_dir(&self, node: &String) -> bool {
        matches!(self.state.lock().unwrap().entries.get(node), Some(HostEntry::Dir))
    }

    fn is_file(&self, node: &String) -> bool {
        matches!(self.state.lock().unwrap().entries.get(node), Some(HostEntry::File(_)))
    }

    fn size(&self, node: &String) -> u64 {
        match self.state.lock().unwrap().entries.get(node) {
            Some(HostEntry::File(data)) => data.len() as u64,
            _ => 0,
        }
    }

    fn children(&self, node: &String) -> io::Result<Vec<String>> {
        self.check("list", node)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .keys()
            .filter(|k| k.as_str() != "/" && parent_path(k) == Some(node.as_str()))
            .cloned()
            .collect())
    }

    fn open_read(&self, node: &String) -> io::Result<Box<dyn Read + Send>> {
        self.check("read", node)?;
        let state = self.state.lock().unwrap();
        match state.entries.get(node) {
            Some(HostEntry::File(data)) => {
                let mut data = data.clone();
                if state.short_reads.contains(node) {
                    data.pop();
                }
                Ok(Box::new(io::Cursor::new(data)))
            }
            _ => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }

    fn create_dir(&self, parent: &String, name: &str) -> io::Result<String> {
        self.create(parent, name, HostEntry::Dir)
    }

    fn create_file(&self, parent: &String, name: &str) -> io::Result<String> {
        self.create(parent, name, HostEntry::File(Vec::new()))
    }

    fn open_write(&self, node: &String) -> io::Result<Box<dyn Write + Send>> {
        self.check("write", node)?;
        Ok(Box::new(MemWriter {
            state: Arc::clone(&self.state),
            path: node.clone(),
        }))
    }

    fn delete(&self, node: &String) -> io::Result<()> {
        self.check("delete", node)?;
        let mut state = self.state.lock().unwrap();
        let prefix = format!("{node}/");
        state
            .entries
            .retain(|k, _| k != node && !k.starts_with(&prefix));
        Ok(())
    }

    fn reference(&self, node: &String) -> String {
        format!("mem://{node}")
    }
}

/// Wiper that deletes nodes and fails on chosen ones.
#[derive(Default)]
pub struct MemWiper {
    failing: HashSet<String>,
    wiped: Mutex<Vec<String>>,
}

impl MemWiper {
    pub fn failing_on(path: &str) -> Self {
        Self {
            failing: HashSet::from([path.to_string()]),
            wiped: Mutex::new(Vec::new()),
        }
    }

    pub fn wiped(&self) -> Vec<String> {
        self.wiped.lock().unwrap().clone()
    }
}

impl SecureWiper<MemHost> for MemWiper {
    fn wipe(&self, host: &MemHost, node: &String) -> Result<(), String> {
        self.wiped.lock().unwrap().push(node.clone());
        if self.failing.contains(node) {
            return Err(format!("cannot wipe {node}"));
        }
        host.delete(node).map_err(|e| e.to_string())
    }
}
