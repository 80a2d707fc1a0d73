//! The encrypted volume capability set.
//!
//! The engine only ever talks to a volume through [`Volume`]. Backends that
//! hold handle tables or other mutable native state implement the simpler
//! [`VolumeBackend`] and are wrapped in a [`SharedVolume`], which takes one
//! lock per native call. The lock is never held across a multi-file loop, so
//! concurrent operations on the same volume interleave call by call, and a
//! volume close cannot race an in-flight read or write.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::entry::DirEntry;
use crate::error::VolumeError;

/// Opaque handle to a file opened inside a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u32);

/// Synchronous access to a virtual volume.
///
/// Paths are volume-internal, `/`-separated, and rooted at `/` or empty.
pub trait Volume: Send + Sync {
    /// Open a file for reading. `None` means the handle is invalid.
    fn open_read(&self, path: &str) -> Option<FileHandle>;

    /// Open (creating if needed) a file for writing.
    fn open_write(&self, path: &str) -> Option<FileHandle>;

    /// Read into `buf` at `offset`. Zero or negative marks the end.
    fn read(&self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> isize;

    /// Write `buf` at `offset`, returning the number of bytes written.
    fn write(&self, handle: FileHandle, offset: u64, buf: &[u8]) -> isize;

    fn truncate(&self, handle: FileHandle, offset: u64) -> bool;

    fn close_file(&self, handle: FileHandle);

    fn mkdir(&self, path: &str) -> bool;

    fn rmdir(&self, path: &str) -> bool;

    fn remove_file(&self, path: &str) -> bool;

    fn rename(&self, old_path: &str, new_path: &str) -> bool;

    fn exists(&self, path: &str) -> bool;

    /// Size of a file in bytes, `None` on error.
    fn size(&self, path: &str) -> Option<u64>;

    /// List a directory in the order the volume returns entries.
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, VolumeError>;

    /// Close the whole volume. Later calls fail.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Single-threaded volume implementation wrapped by [`SharedVolume`].
pub trait VolumeBackend: Send {
    fn open_read(&mut self, path: &str) -> Option<FileHandle>;
    fn open_write(&mut self, path: &str) -> Option<FileHandle>;
    fn read(&mut self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> isize;
    fn write(&mut self, handle: FileHandle, offset: u64, buf: &[u8]) -> isize;
    fn truncate(&mut self, handle: FileHandle, offset: u64) -> bool;
    fn close_file(&mut self, handle: FileHandle);
    fn mkdir(&mut self, path: &str) -> bool;
    fn rmdir(&mut self, path: &str) -> bool;
    fn remove_file(&mut self, path: &str) -> bool;
    fn rename(&mut self, old_path: &str, new_path: &str) -> bool;
    fn exists(&mut self, path: &str) -> bool;
    fn size(&mut self, path: &str) -> Option<u64>;
    fn list_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, VolumeError>;
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

/// A [`VolumeBackend`] serialized behind one lock per call.
#[derive(Debug, Default)]
pub struct SharedVolume<B> {
    backend: Mutex<B>,
}

impl<B: VolumeBackend> SharedVolume<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Consume the wrapper and return the backend.
    pub fn into_inner(self) -> B {
        self.backend.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, B> {
        // Backends keep no invariants across calls, so a poisoned lock is
        // still usable.
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: VolumeBackend> Volume for SharedVolume<B> {
    fn open_read(&self, path: &str) -> Option<FileHandle> {
        self.lock().open_read(path)
    }

    fn open_write(&self, path: &str) -> Option<FileHandle> {
        self.lock().open_write(path)
    }

    fn read(&self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> isize {
        self.lock().read(handle, offset, buf)
    }

    fn write(&self, handle: FileHandle, offset: u64, buf: &[u8]) -> isize {
        self.lock().write(handle, offset, buf)
    }

    fn truncate(&self, handle: FileHandle, offset: u64) -> bool {
        self.lock().truncate(handle, offset)
    }

    fn close_file(&self, handle: FileHandle) {
        self.lock().close_file(handle)
    }

    fn mkdir(&self, path: &str) -> bool {
        self.lock().mkdir(path)
    }

    fn rmdir(&self, path: &str) -> bool {
        self.lock().rmdir(path)
    }

    fn remove_file(&self, path: &str) -> bool {
        self.lock().remove_file(path)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> bool {
        self.lock().rename(old_path, new_path)
    }

    fn exists(&self, path: &str) -> bool {
        self.lock().exists(path)
    }

    fn size(&self, path: &str) -> Option<u64> {
        self.lock().size(path)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, VolumeError> {
        self.lock().list_dir(path)
    }

    fn close(&self) {
        self.lock().close()
    }

    fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }
}
