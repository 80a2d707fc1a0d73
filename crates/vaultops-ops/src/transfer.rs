//! Fixed-buffer byte streaming between volumes and host streams.

use std::io::{self, Read, Write};

use tracing::debug;
use vaultops_core::{FileHandle, LoadError, Volume};

/// Copy a file between two volumes, which may be the same one.
///
/// Returns `false` if either side cannot be opened or a write comes up
/// short. Both handles are closed whatever happens.
pub fn copy_file(
    src: &dyn Volume,
    src_path: &str,
    dst: &dyn Volume,
    dst_path: &str,
    chunk_size: usize,
) -> bool {
    let Some(src_handle) = src.open_read(src_path) else {
        debug!(path = src_path, "cannot open source for reading");
        return false;
    };

    let success = match dst.open_write(dst_path) {
        Some(dst_handle) => {
            let copied = pump_volume(src, src_handle, dst, dst_handle, chunk_size);
            let success = match copied {
                Some(len) => dst.truncate(dst_handle, len),
                None => false,
            };
            dst.close_file(dst_handle);
            success
        }
        None => {
            debug!(path = dst_path, "cannot open destination for writing");
            false
        }
    };

    src.close_file(src_handle);
    success
}

fn pump_volume(
    src: &dyn Volume,
    src_handle: FileHandle,
    dst: &dyn Volume,
    dst_handle: FileHandle,
    chunk_size: usize,
) -> Option<u64> {
    let mut buffer = vec![0u8; chunk_size];
    let mut offset = 0u64;

    loop {
        let length = src.read(src_handle, offset, &mut buffer);
        if length <= 0 {
            return Some(offset);
        }
        let length = length as usize;
        let written = dst.write(dst_handle, offset, &buffer[..length]);
        if written != length as isize {
            return None;
        }
        offset += length as u64;
    }
}

/// Stream `reader` into a newly opened volume file at `dst_path`.
///
/// The destination handle is closed whether or not the stream succeeded.
pub fn import_stream(
    volume: &dyn Volume,
    reader: &mut dyn Read,
    dst_path: &str,
    chunk_size: usize,
) -> bool {
    let Some(handle) = volume.open_write(dst_path) else {
        debug!(path = dst_path, "cannot open destination for writing");
        return false;
    };

    let mut buffer = vec![0u8; chunk_size];
    let mut offset = 0u64;
    let success = loop {
        let length = match reader.read(&mut buffer) {
            Ok(0) => break volume.truncate(handle, offset),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(path = dst_path, error = %e, "source stream failed");
                break false;
            }
        };
        let written = volume.write(handle, offset, &buffer[..length]);
        if written != length as isize {
            break false;
        }
        offset += length as u64;
    };

    volume.close_file(handle);
    success
}

/// Stream a volume file into `writer`.
pub fn export_file(
    volume: &dyn Volume,
    src_path: &str,
    writer: &mut dyn Write,
    chunk_size: usize,
) -> bool {
    let Some(handle) = volume.open_read(src_path) else {
        debug!(path = src_path, "cannot open source for reading");
        return false;
    };

    let mut buffer = vec![0u8; chunk_size];
    let mut offset = 0u64;
    let success = loop {
        let length = volume.read(handle, offset, &mut buffer);
        if length <= 0 {
            break writer.flush().is_ok();
        }
        let length = length as usize;
        if let Err(e) = writer.write_all(&buffer[..length]) {
            debug!(path = src_path, error = %e, "destination stream failed");
            break false;
        }
        offset += length as u64;
    };

    volume.close_file(handle);
    success
}

/// Copy between two host streams with the same fixed buffer.
pub fn pipe(reader: &mut dyn Read, writer: &mut dyn Write, chunk_size: usize) -> io::Result<u64> {
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let length = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..length])?;
        total += length as u64;
    }
    writer.flush()?;
    Ok(total)
}

/// Read a whole volume file into memory.
///
/// `size` is the declared size if the caller already knows it; otherwise
/// the volume is asked. Files larger than `max_size` are rejected before
/// anything is allocated or read.
pub fn load_whole_file(
    volume: &dyn Volume,
    path: &str,
    size: Option<u64>,
    max_size: Option<u64>,
    chunk_size: usize,
) -> Result<Vec<u8>, LoadError> {
    let size = size
        .or_else(|| volume.size(path))
        .ok_or(LoadError::SizeUnavailable)?;

    if let Some(max) = max_size {
        if size > max {
            return Err(LoadError::TooLarge { size, max });
        }
    }

    let capacity = usize::try_from(size).map_err(|_| LoadError::OutOfMemory { size })?;
    let mut data = Vec::new();
    data.try_reserve_exact(capacity)
        .map_err(|_| LoadError::OutOfMemory { size })?;

    let handle = volume.open_read(path).ok_or(LoadError::OpenFailed)?;

    let mut buffer = vec![0u8; chunk_size];
    loop {
        let length = volume.read(handle, data.len() as u64, &mut buffer);
        if length <= 0 {
            break;
        }
        let length = length as usize;
        // Never grow past the declared size.
        if data.len() + length > capacity {
            volume.close_file(handle);
            return Err(LoadError::IncompleteRead {
                expected: size,
                read: (data.len() + length) as u64,
            });
        }
        data.extend_from_slice(&buffer[..length]);
    }
    volume.close_file(handle);

    if data.len() as u64 != size {
        return Err(LoadError::IncompleteRead {
            expected: size,
            read: data.len() as u64,
        });
    }

    Ok(data)
}
