// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic file-descriptor I/O.
//!
//! A [`Descriptor`] starts unopened and is then bound either to one of the
//! process's standard streams or to a file/device it owns. Standard streams
//! are borrowed: closing the descriptor never closes fd 0, 1 or 2.

use crate::debug::diag;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// Standard stream selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StdStream {
    /// Standard input (fd 0).
    Stdin = 0,
    /// Standard output (fd 1).
    Stdout = 1,
    /// Standard error (fd 2).
    Stderr = 2,
}

impl StdStream {
    /// Descriptor number.
    #[must_use]
    pub const fn raw_fd(self) -> RawFd {
        match self {
            StdStream::Stdin => libc::STDIN_FILENO,
            StdStream::Stdout => libc::STDOUT_FILENO,
            StdStream::Stderr => libc::STDERR_FILENO,
        }
    }
}

impl TryFrom<i32> for StdStream {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(StdStream::Stdin),
            1 => Ok(StdStream::Stdout),
            2 => Ok(StdStream::Stderr),
            other => Err(Error::BadArgs(format!("unknown standard stream {}", other))),
        }
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Closed,
    Std(StdStream),
    Owned(File),
}

/// Byte-stream descriptor (file, device, or standard stream).
#[derive(Debug, Default)]
pub struct Descriptor {
    state: State,
}

impl Descriptor {
    /// Unopened descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a standard stream, replacing any previous binding.
    pub fn open_std(&mut self, stream: StdStream) -> Result<()> {
        self.close()?;
        self.state = State::Std(stream);
        Ok(())
    }

    /// Open `path` read-write, replacing any previous binding.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                diag!(format!("open({})", path.display()), e);
                Error::Io(e)
            })?;
        self.close()?;
        self.state = State::Owned(file);
        Ok(())
    }

    /// `true` once bound to a stream or file.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    fn raw(&self) -> Result<RawFd> {
        match &self.state {
            State::Closed => Err(Error::InvalidState("descriptor is not open".into())),
            State::Std(stream) => Ok(stream.raw_fd()),
            State::Owned(file) => Ok(file.as_raw_fd()),
        }
    }

    /// Clear `O_NONBLOCK`.
    pub fn set_blocking(&self) -> Result<()> {
        set_fd_nonblocking(self.raw()?, false)
    }

    /// Set `O_NONBLOCK`.
    pub fn set_nonblocking(&self) -> Result<()> {
        set_fd_nonblocking(self.raw()?, true)
    }

    /// Read up to `buf.len()` bytes.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let result = match &self.state {
            State::Owned(file) => (&*file).read(buf),
            State::Std(stream) => read_raw(stream.raw_fd(), buf),
            State::Closed => return Err(Error::InvalidState("descriptor is not open".into())),
        };
        result.map_err(|e| transfer_error("read", e))
    }

    /// Write up to `buf.len()` bytes.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let result = match &self.state {
            State::Owned(file) => (&*file).write(buf),
            State::Std(stream) => write_raw(stream.raw_fd(), buf),
            State::Closed => return Err(Error::InvalidState("descriptor is not open".into())),
        };
        result.map_err(|e| transfer_error("write", e))
    }

    /// Close an owned file; unbind a standard stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if let State::Owned(file) = std::mem::take(&mut self.state) {
            close_reporting(file)?;
        }
        Ok(())
    }
}

impl AsRawFd for Descriptor {
    /// `-1` while unopened.
    fn as_raw_fd(&self) -> RawFd {
        self.raw().unwrap_or(-1)
    }
}

/// Set or clear `O_NONBLOCK` on any descriptor.
pub fn set_fd_nonblocking(fd: RawFd, nonblocking: bool) -> Result<()> {
    // SAFETY: F_GETFL takes no argument; an invalid fd yields EBADF.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        let e = Error::last_os_error();
        diag!("fcntl(F_GETFL)", e);
        return Err(e);
    }
    let wanted = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if wanted == flags {
        return Ok(());
    }
    // SAFETY: F_SETFL takes an int flag argument.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, wanted) } < 0 {
        let e = Error::last_os_error();
        diag!("fcntl(F_SETFL)", e);
        return Err(e);
    }
    Ok(())
}

fn read_raw(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: buf is a valid writable region of buf.len() bytes.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn write_raw(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    // SAFETY: buf is a valid readable region of buf.len() bytes.
    let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn transfer_error(call: &str, e: io::Error) -> Error {
    if e.kind() != io::ErrorKind::WouldBlock {
        diag!(call, e);
    }
    Error::Io(e)
}

/// Close `file` and surface the `close(2)` result, which `Drop` discards.
fn close_reporting(file: File) -> Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: fd was just released by File and is closed exactly once here.
    if unsafe { libc::close(fd) } < 0 {
        let e = Error::last_os_error();
        diag!("close", e);
        return Err(e);
    }
    Ok(())
}
