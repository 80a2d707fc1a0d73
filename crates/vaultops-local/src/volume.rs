//! A volume kept in a plain host directory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vaultops_core::{
    is_volume_root, DirEntry, FileHandle, OpsConfig, SharedVolume, VolumeBackend, VolumeError,
};

/// A [`DirVolume`] ready for concurrent use by the engine.
pub type LocalVolume = SharedVolume<DirVolume>;

/// Contents of the configuration artifact written at a volume root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeHeader {
    pub creator: String,
    pub version: u32,
}

impl Default for VolumeHeader {
    fn default() -> Self {
        Self {
            creator: concat!("vaultops ", env!("CARGO_PKG_VERSION")).to_string(),
            version: 2,
        }
    }
}

/// Volume backend over a host directory.
///
/// Volume paths map onto files below the root. The configuration artifact
/// is hidden from listings, and `..` components are refused.
#[derive(Debug)]
pub struct DirVolume {
    root: PathBuf,
    config_name: String,
    handles: HashMap<u32, File>,
    next_handle: u32,
    closed: bool,
}

impl DirVolume {
    /// Open an existing volume rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, config: &OpsConfig) -> Result<Self, VolumeError> {
        let root = root.into();
        if !is_volume_root(&root, config) {
            return Err(VolumeError::NotAVolume {
                path: root.display().to_string(),
            });
        }
        debug!(root = %root.display(), "volume opened");
        Ok(Self {
            root,
            config_name: config.volume_config_name.clone(),
            handles: HashMap::new(),
            next_handle: 0,
            closed: false,
        })
    }

    /// Initialize a new volume at `root` and open it.
    ///
    /// The directory may already exist but must not be a volume yet.
    pub fn create(root: impl Into<PathBuf>, config: &OpsConfig) -> Result<Self, VolumeError> {
        let root = root.into();
        let display = root.display().to_string();
        let header_path = config.volume_config_path(&root);
        if header_path.exists() {
            return Err(VolumeError::io(
                display,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "volume already exists"),
            ));
        }

        fs::create_dir_all(&root).map_err(|e| VolumeError::io(&display, e))?;
        let header = serde_json::to_vec_pretty(&VolumeHeader::default())
            .map_err(|e| VolumeError::io(&display, e.into()))?;
        fs::write(&header_path, header).map_err(|e| VolumeError::io(&display, e))?;

        Self::open(root, config)
    }

    /// Read the configuration artifact of the volume at `root`.
    pub fn read_header(root: &Path, config: &OpsConfig) -> Result<VolumeHeader, VolumeError> {
        let path = config.volume_config_path(root);
        let display = path.display().to_string();
        let bytes = fs::read(&path).map_err(|e| VolumeError::io(&display, e))?;
        serde_json::from_slice(&bytes).map_err(|e| VolumeError::io(display, e.into()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files currently open.
    pub fn open_files(&self) -> usize {
        self.handles.len()
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            warn!(path, "refusing path outside the volume");
            return None;
        }
        Some(self.root.join(relative))
    }

    fn live(&self, path: &str) -> Option<PathBuf> {
        if self.closed {
            return None;
        }
        self.resolve(path)
    }

    fn register(&mut self, file: File) -> FileHandle {
        self.next_handle = self.next_handle.wrapping_add(1);
        self.handles.insert(self.next_handle, file);
        FileHandle(self.next_handle)
    }

    fn is_header(&self, path: &Path) -> bool {
        path.parent() == Some(self.root.as_path())
            && path.file_name().is_some_and(|n| n == self.config_name.as_str())
    }
}

fn modified(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

impl VolumeBackend for DirVolume {
    fn open_read(&mut self, path: &str) -> Option<FileHandle> {
        let full = self.live(path)?;
        if !full.is_file() {
            return None;
        }
        match File::open(&full) {
            Ok(file) => Some(self.register(file)),
            Err(e) => {
                debug!(path, error = %e, "open for reading failed");
                None
            }
        }
    }

    fn open_write(&mut self, path: &str) -> Option<FileHandle> {
        let full = self.live(path)?;
        if full == self.root || self.is_header(&full) {
            return None;
        }
        match OpenOptions::new().write(true).create(true).truncate(false).open(&full) {
            Ok(file) => Some(self.register(file)),
            Err(e) => {
                debug!(path, error = %e, "open for writing failed");
                None
            }
        }
    }

    fn read(&mut self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> isize {
        let Some(file) = self.handles.get_mut(&handle.0) else {
            return -1;
        };
        let read = file.seek(SeekFrom::Start(offset)).and_then(|_| file.read(buf));
        match read {
            Ok(n) => n as isize,
            Err(e) => {
                debug!(handle = handle.0, error = %e, "read failed");
                -1
            }
        }
    }

    fn write(&mut self, handle: FileHandle, offset: u64, buf: &[u8]) -> isize {
        let Some(file) = self.handles.get_mut(&handle.0) else {
            return -1;
        };
        let written = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(buf));
        match written {
            Ok(()) => buf.len() as isize,
            Err(e) => {
                debug!(handle = handle.0, error = %e, "write failed");
                -1
            }
        }
    }

    fn truncate(&mut self, handle: FileHandle, offset: u64) -> bool {
        self.handles
            .get(&handle.0)
            .is_some_and(|file| file.set_len(offset).is_ok())
    }

    fn close_file(&mut self, handle: FileHandle) {
        self.handles.remove(&handle.0);
    }

    fn mkdir(&mut self, path: &str) -> bool {
        self.live(path).is_some_and(|full| fs::create_dir(full).is_ok())
    }

    fn rmdir(&mut self, path: &str) -> bool {
        match self.live(path) {
            Some(full) if full != self.root => fs::remove_dir(full).is_ok(),
            _ => false,
        }
    }

    fn remove_file(&mut self, path: &str) -> bool {
        match self.live(path) {
            Some(full) if !self.is_header(&full) => fs::remove_file(full).is_ok(),
            _ => false,
        }
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> bool {
        let (Some(from), Some(to)) = (self.live(old_path), self.live(new_path)) else {
            return false;
        };
        if from == self.root || to.exists() || self.is_header(&from) {
            return false;
        }
        fs::rename(from, to).is_ok()
    }

    fn exists(&mut self, path: &str) -> bool {
        self.live(path).is_some_and(|full| full.exists())
    }

    fn size(&mut self, path: &str) -> Option<u64> {
        let metadata = fs::metadata(self.live(path)?).ok()?;
        metadata.is_file().then(|| metadata.len())
    }

    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, VolumeError> {
        if self.closed {
            return Err(VolumeError::Closed);
        }
        let full = self.resolve(path).ok_or_else(|| {
            VolumeError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path outside volume"),
            )
        })?;
        let read_dir = fs::read_dir(&full).map_err(|e| VolumeError::io(path, e))?;

        let mut entries = Vec::new();
        if full != self.root {
            entries.push(DirEntry::parent_marker());
        }
        for entry in read_dir {
            let entry = entry.map_err(|e| VolumeError::io(path, e))?;
            if self.is_header(&entry.path()) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let dir_entry = if metadata.is_dir() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name, metadata.len())
            };
            entries.push(match modified(&metadata) {
                Some(time) => dir_entry.with_modified(time),
                None => dir_entry,
            });
        }
        Ok(entries)
    }

    fn close(&mut self) {
        if !self.closed {
            debug!(root = %self.root.display(), open = self.handles.len(), "volume closed");
        }
        self.handles.clear();
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
