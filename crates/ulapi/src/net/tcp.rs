// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream sockets: client, server and accepted connections.

use super::{Socket, SocketRole};
use crate::config::{LISTEN_BACKLOG, SERVER_LINGER};
use crate::debug::diag;
use crate::error::{Error, Result};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::os::unix::io::AsRawFd;

const LISTENER_TOKEN: Token = Token(0);

impl Socket {
    /// Connect to `host:port`.
    ///
    /// `host` is a name or dotted quad; the first IPv4 address it resolves
    /// to is used.
    pub fn client(port: u16, host: &str) -> Result<Self> {
        let addr = resolve_ipv4(host, port)?;
        let socket = socket2::Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| {
                diag!("socket", e);
                Error::Io(e)
            })?;
        socket.connect(&SocketAddr::V4(addr).into()).map_err(|e| {
            diag!(format!("connect({})", addr), e);
            Error::Io(e)
        })?;
        log::debug!("[NET] client fd={} connected to {}", socket.as_raw_fd(), addr);
        Ok(Self::from_parts(socket, SocketRole::Client))
    }

    /// Listen on `0.0.0.0:port` (port 0 picks a free port).
    ///
    /// Address reuse is enabled so a restarted server can rebind through
    /// `TIME_WAIT`, and closing lingers up to 30 s to flush pending output.
    pub fn server(port: u16) -> Result<Self> {
        let socket = socket2::Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| {
                diag!("socket", e);
                Error::Io(e)
            })?;
        socket.set_reuse_address(true).map_err(|e| {
            diag!("setsockopt(SO_REUSEADDR)", e);
            Error::Io(e)
        })?;
        socket.set_linger(Some(SERVER_LINGER)).map_err(|e| {
            diag!("setsockopt(SO_LINGER)", e);
            Error::Io(e)
        })?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SocketAddr::V4(bind_addr).into()).map_err(|e| {
            diag!(format!("bind({})", bind_addr), e);
            Error::Io(e)
        })?;
        socket.listen(LISTEN_BACKLOG).map_err(|e| {
            diag!("listen", e);
            Error::Io(e)
        })?;

        let server = Self::from_parts(socket, SocketRole::Server);
        log::debug!(
            "[NET] server fd={} listening on port {}",
            server.as_raw_fd(),
            server.local_port().unwrap_or(port)
        );
        Ok(server)
    }

    /// Wait for a client and accept it.
    ///
    /// Blocks without a timeout until a connection is pending, whether or
    /// not the listener itself is non-blocking.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless this is a [`SocketRole::Server`] socket.
    pub fn accept(&self) -> Result<Socket> {
        if self.role != SocketRole::Server {
            return Err(Error::InvalidState(format!(
                "accept on a {} socket",
                self.role
            )));
        }

        let fd = self.as_raw_fd();
        let mut poll = Poll::new()?;
        let mut source = SourceFd(&fd);
        poll.registry()
            .register(&mut source, LISTENER_TOKEN, Interest::READABLE)?;
        let mut events = Events::with_capacity(1);

        // Readiness is edge-triggered: drain accept() until WouldBlock and
        // only then wait for the next edge.
        let accepted = loop {
            match self.inner.accept() {
                Ok((socket, peer)) => break (socket, peer),
                // The client already left, or a signal interrupted us.
                Err(e)
                    if e.kind() == io::ErrorKind::Interrupted
                        || e.raw_os_error() == Some(libc::ECONNABORTED) =>
                {
                    continue
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    diag!("accept", e);
                    return Err(Error::Io(e));
                }
            }
            match poll.poll(&mut events, None) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    diag!("poll(accept)", e);
                    return Err(Error::Io(e));
                }
            }
        };
        poll.registry().deregister(&mut source)?;

        let (socket, peer) = accepted;
        // Accepted sockets start blocking regardless of the listener's mode.
        socket.set_nonblocking(false)?;
        log::debug!(
            "[NET] server fd={} accepted fd={} from {:?}",
            fd,
            socket.as_raw_fd(),
            peer.as_socket()
        );
        Ok(Self::from_parts(socket, SocketRole::Connection))
    }
}

fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddrV4> {
    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        diag!(format!("resolve({})", host), e);
        Error::Io(e)
    })?;
    addrs
        .filter_map(|a| match a {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| Error::BadArgs(format!("{} has no IPv4 address", host)))
}
