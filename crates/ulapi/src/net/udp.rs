// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram sockets: subnet broadcast senders and receivers.

use super::addr::host_address;
use super::{Socket, SocketRole};
use crate::debug::diag;
use crate::error::{Error, Result};
use socket2::{Domain, Protocol, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::AsRawFd;

impl Socket {
    /// Unbound datagram socket allowed to send broadcasts.
    pub fn broadcaster() -> Result<Self> {
        let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| {
                diag!("socket", e);
                Error::Io(e)
            })?;
        socket.set_broadcast(true).map_err(|e| {
            diag!("setsockopt(SO_BROADCAST)", e);
            Error::Io(e)
        })?;
        log::debug!("[NET] broadcaster fd={}", socket.as_raw_fd());
        Ok(Self::from_parts(socket, SocketRole::Broadcaster))
    }

    /// Datagram socket bound to `0.0.0.0:port`.
    pub fn broadcastee(port: u16) -> Result<Self> {
        let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| {
                diag!("socket", e);
                Error::Io(e)
            })?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&SocketAddr::V4(bind_addr).into()).map_err(|e| {
            diag!(format!("bind({})", bind_addr), e);
            Error::Io(e)
        })?;
        log::debug!("[NET] broadcastee fd={} bound to {}", socket.as_raw_fd(), bind_addr);
        Ok(Self::from_parts(socket, SocketRole::Broadcastee))
    }

    /// Send `buf` to `port` on this host's subnet broadcast address.
    ///
    /// The address is the host address with its last octet set to 255.
    pub fn broadcast(&self, port: u16, buf: &[u8]) -> Result<usize> {
        self.send_to_v4(SocketAddrV4::new(broadcast_address(host_address()), port), buf)
    }

    /// Send one datagram to `dest`.
    ///
    /// # Errors
    ///
    /// `InvalidState` on stream sockets.
    pub fn send_to_v4(&self, dest: SocketAddrV4, buf: &[u8]) -> Result<usize> {
        if self.role.is_stream() {
            return Err(Error::InvalidState(format!(
                "datagram send on a {} socket",
                self.role
            )));
        }
        self.inner
            .send_to(buf, &SocketAddr::V4(dest).into())
            .map_err(|e| {
                diag!(format!("sendto({})", dest), e);
                Error::Io(e)
            })
    }
}

/// `a.b.c.255` for host address `a.b.c.d`.
fn broadcast_address(host: u32) -> Ipv4Addr {
    Ipv4Addr::from(host | 0xFF)
}
