// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Role-tagged IPv4 socket with a shared transfer surface.
//!
//! Constructors live next to their protocol (`tcp`, `udp`); once built,
//! every role reads, writes and closes the same way.

use crate::debug::diag;
use crate::error::{Error, Result};
use crate::io::set_fd_nonblocking;
use std::fmt;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

/// What a socket was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketRole {
    /// Outgoing stream connection.
    Client,
    /// Listening stream socket.
    Server,
    /// Stream accepted from a server.
    Connection,
    /// Datagram sender with broadcast enabled.
    Broadcaster,
    /// Datagram receiver bound to a port.
    Broadcastee,
}

impl SocketRole {
    /// `true` for stream roles.
    #[must_use]
    pub const fn is_stream(self) -> bool {
        matches!(
            self,
            SocketRole::Client | SocketRole::Server | SocketRole::Connection
        )
    }
}

impl fmt::Display for SocketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketRole::Client => "client",
            SocketRole::Server => "server",
            SocketRole::Connection => "connection",
            SocketRole::Broadcaster => "broadcaster",
            SocketRole::Broadcastee => "broadcastee",
        };
        f.write_str(name)
    }
}

/// Open socket.
pub struct Socket {
    pub(super) inner: socket2::Socket,
    pub(super) role: SocketRole,
}

impl Socket {
    pub(super) fn from_parts(inner: socket2::Socket, role: SocketRole) -> Self {
        Self { inner, role }
    }

    /// Role this socket was created for.
    #[must_use]
    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// Underlying `socket2` handle, for options not covered here.
    #[must_use]
    pub fn as_socket2(&self) -> &socket2::Socket {
        &self.inner
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` on a stream means the peer closed.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (&self.inner)
            .read(buf)
            .map_err(|e| transfer_error("read(socket)", e))
    }

    /// Write up to `buf.len()` bytes; the count actually sent is returned.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        (&self.inner)
            .write(buf)
            .map_err(|e| transfer_error("write(socket)", e))
    }

    /// Clear `O_NONBLOCK`.
    pub fn set_blocking(&self) -> Result<()> {
        set_fd_nonblocking(self.as_raw_fd(), false)
    }

    /// Set `O_NONBLOCK`.
    pub fn set_nonblocking(&self) -> Result<()> {
        set_fd_nonblocking(self.as_raw_fd(), true)
    }

    /// Local port (useful after binding port 0).
    pub fn local_port(&self) -> Result<u16> {
        let addr = self.inner.local_addr()?;
        addr.as_socket()
            .map(|a| a.port())
            .ok_or_else(|| Error::InvalidState("socket has no IP address".into()))
    }

    /// Close, reporting the `close(2)` result.
    pub fn close(self) -> Result<()> {
        let fd = self.inner.into_raw_fd();
        // SAFETY: fd was just released by socket2 and is closed exactly once here.
        if unsafe { libc::close(fd) } < 0 {
            let e = Error::last_os_error();
            diag!("close(socket)", e);
            return Err(e);
        }
        log::debug!("[NET] closed {} socket fd={}", self.role, fd);
        Ok(())
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("fd", &self.as_raw_fd())
            .field("role", &self.role)
            .finish()
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl IntoRawFd for Socket {
    fn into_raw_fd(self) -> RawFd {
        self.inner.into_raw_fd()
    }
}

impl Socket {
    /// Adopt a descriptor previously released with [`IntoRawFd`].
    ///
    /// # Safety
    ///
    /// `fd` must be an open IPv4 socket of the kind `role` describes, owned
    /// by nobody else.
    #[must_use]
    pub unsafe fn from_raw_fd_with_role(fd: RawFd, role: SocketRole) -> Self {
        // SAFETY: forwarded to the caller.
        Self::from_parts(unsafe { socket2::Socket::from_raw_fd(fd) }, role)
    }
}

impl FromRawFd for Socket {
    /// Adopts `fd` as a [`SocketRole::Connection`].
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_fd_with_role(fd, SocketRole::Connection) }
    }
}

fn transfer_error(call: &str, e: io::Error) -> Error {
    if e.kind() != io::ErrorKind::WouldBlock {
        diag!(call, e);
    }
    Error::Io(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kinds() {
        assert!(SocketRole::Server.is_stream());
        assert!(SocketRole::Connection.is_stream());
        assert!(!SocketRole::Broadcastee.is_stream());
        assert_eq!(SocketRole::Broadcaster.to_string(), "broadcaster");
    }

    #[test]
    fn test_raw_fd_roundtrip() {
        let socket = Socket::broadcastee(0).expect("bind");
        let port = socket.local_port().expect("port");
        let fd = socket.into_raw_fd();

        // SAFETY: fd was released just above and is owned by nobody else.
        let socket = unsafe { Socket::from_raw_fd_with_role(fd, SocketRole::Broadcastee) };
        assert_eq!(socket.local_port().expect("port"), port);
        assert_eq!(socket.role(), SocketRole::Broadcastee);
        socket.close().expect("close");
    }

    #[test]
    fn test_blocking_toggle() {
        let socket = Socket::broadcaster().expect("socket");
        socket.set_nonblocking().expect("nonblocking");
        let mut buf = [0u8; 4];
        // Unbound datagram socket with nothing queued.
        assert!(socket.read(&mut buf).expect_err("empty").is_would_block());
        socket.set_blocking().expect("blocking");
        socket.close().expect("close");
    }
}
