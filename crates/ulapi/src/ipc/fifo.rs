// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Keyed one-way byte channels over named pipes.
//!
//! A FIFO lives at `<fifo_dir>/ulapi_fifo_<key>`. Both ends open it
//! read-write and non-blocking, so neither side waits for a peer at open
//! time and transfers never block: an empty pipe reads as `WouldBlock`, a
//! full one writes short or `WouldBlock`. Callers handle partial transfers.

use crate::config::{fifo_path_in, DEFAULT_FIFO_DIR, FIFO_PERMISSIONS};
use crate::debug::diag;
use crate::error::{Error, Result};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Open named pipe.
#[derive(Debug)]
pub struct Fifo {
    key: i32,
    path: PathBuf,
    file: File,
    capacity: usize,
}

impl Fifo {
    /// Open (creating if needed) the FIFO for `key` in the default directory.
    pub fn new(key: i32, size: usize) -> Result<Self> {
        Self::open_in(Path::new(DEFAULT_FIFO_DIR), key, size)
    }

    /// Open (creating if needed) the FIFO for `key` under `dir`.
    ///
    /// The pipe capacity is raised to `size` when the kernel allows it.
    pub fn open_in(dir: &Path, key: i32, size: usize) -> Result<Self> {
        Self::create(&fifo_path_in(dir, key), key, size, false)
    }

    /// With `strict_capacity`, failing to size the pipe fails the open.
    pub(crate) fn create(path: &Path, key: i32, size: usize, strict_capacity: bool) -> Result<Self> {
        if size == 0 {
            return Err(Error::BadArgs("FIFO size must be non-zero".into()));
        }

        make_fifo(path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| {
                diag!("open(fifo)", e);
                Error::Io(e)
            })?;

        let capacity = match set_capacity(&file, size) {
            Ok(actual) => actual,
            Err(e) if strict_capacity => {
                diag!("fcntl(F_SETPIPE_SZ)", e);
                return Err(e);
            }
            Err(e) => {
                if crate::debug::debug_enabled(crate::debug::DEBUG_WARNING) {
                    log::warn!("[FIFO] keeping default capacity for {}: {}", path.display(), e);
                }
                current_capacity(&file).unwrap_or(size)
            }
        };

        log::debug!(
            "[FIFO] opened key={} path={} capacity={}",
            key,
            path.display(),
            capacity
        );
        Ok(Self {
            key,
            path: path.to_path_buf(),
            file,
            capacity,
        })
    }

    /// Key this FIFO was opened with.
    #[must_use]
    pub fn key(&self) -> i32 {
        self.key
    }

    /// Filesystem path of the pipe.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pipe capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read up to `buf.len()` bytes. An empty pipe is an `Io` error of kind `WouldBlock`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (&self.file).read(buf).map_err(|e| transfer_error("read(fifo)", e))
    }

    /// Write up to `buf.len()` bytes; the count actually written is returned.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        (&self.file).write(buf).map_err(|e| transfer_error("write(fifo)", e))
    }

    /// Close the descriptor and unlink the pipe.
    pub fn delete(self) -> Result<()> {
        let Self { key, path, file, .. } = self;
        drop(file);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                diag!("unlink(fifo)", e);
                return Err(Error::Io(e));
            }
        }
        log::debug!("[FIFO] deleted key={} path={}", key, path.display());
        Ok(())
    }
}

impl AsRawFd for Fifo {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn transfer_error(call: &str, e: io::Error) -> Error {
    if e.kind() != io::ErrorKind::WouldBlock {
        diag!(call, e);
    }
    Error::Io(e)
}

fn make_fifo(path: &Path) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::BadArgs(format!("FIFO path contains NUL: {}", path.display())))?;

    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_PERMISSIONS as libc::mode_t) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EEXIST) {
        diag!("mkfifo", err);
        return Err(Error::Io(err));
    }

    // Something already has the name; only a pipe is acceptable.
    let meta = std::fs::metadata(path)?;
    if meta.file_type().is_fifo() {
        Ok(())
    } else {
        Err(Error::InvalidState(format!(
            "{} exists and is not a FIFO",
            path.display()
        )))
    }
}

#[cfg(target_os = "linux")]
fn set_capacity(file: &File, size: usize) -> Result<usize> {
    let request = libc::c_int::try_from(size)
        .map_err(|_| Error::BadArgs(format!("FIFO size {} too large", size)))?;
    // SAFETY: file holds an open pipe descriptor; F_SETPIPE_SZ takes an int.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETPIPE_SZ, request) };
    if rc < 0 {
        return Err(Error::last_os_error());
    }
    // The kernel rounds up to a page multiple.
    Ok(rc as usize)
}

#[cfg(not(target_os = "linux"))]
fn set_capacity(_file: &File, _size: usize) -> Result<usize> {
    Err(Error::Unsupported {
        operation: "fifo resize",
        backend: std::env::consts::OS,
    })
}

#[cfg(target_os = "linux")]
fn current_capacity(file: &File) -> Option<usize> {
    // SAFETY: file holds an open pipe descriptor.
    let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETPIPE_SZ) };
    usize::try_from(rc).ok()
}

#[cfg(not(target_os = "linux"))]
fn current_capacity(_file: &File) -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            Fifo::open_in(dir.path(), 1, 0),
            Err(Error::BadArgs(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = Fifo::open_in(dir.path(), 101, 4096).expect("open writer");
        let reader = Fifo::open_in(dir.path(), 101, 4096).expect("open reader");
        assert_eq!(writer.path(), dir.path().join("ulapi_fifo_101"));
        assert!(writer.capacity() >= 4096);

        assert_eq!(writer.write(b"hello").expect("write"), 5);
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).expect("read");
        assert_eq!(&buf[..n], b"hello");

        drop(reader);
        writer.delete().expect("delete");
        assert!(!dir.path().join("ulapi_fifo_101").exists());
    }

    #[test]
    fn test_empty_read_would_block() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fifo = Fifo::open_in(dir.path(), 7, 1024).expect("open");
        let mut buf = [0u8; 8];
        let err = fifo.read(&mut buf).expect_err("empty pipe");
        assert!(err.is_would_block());
        fifo.delete().expect("delete");
    }

    #[test]
    fn test_partial_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fifo = Fifo::open_in(dir.path(), 8, 1024).expect("open");
        fifo.write(b"abcdef").expect("write");

        let mut buf = [0u8; 4];
        assert_eq!(fifo.read(&mut buf).expect("read"), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(fifo.read(&mut buf).expect("read"), 2);
        assert_eq!(&buf[..2], b"ef");
        fifo.delete().expect("delete");
    }

    #[test]
    fn test_existing_regular_file_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("ulapi_fifo_9"), b"not a pipe").expect("write");
        assert!(matches!(
            Fifo::open_in(dir.path(), 9, 1024),
            Err(Error::InvalidState(_))
        ));
    }
}
