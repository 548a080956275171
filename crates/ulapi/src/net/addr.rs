// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IPv4 address helpers.
//!
//! Addresses are host-order `u32` values (`127.0.0.1` is `0x7F00_0001`).

use crate::config::{HOSTNAME_MAX, LOOPBACK_ADDRESS};
use crate::debug::diag;
use crate::error::{Error, Result};
use std::ffi::CStr;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Dotted-quad text of `address`.
#[must_use]
pub fn address_to_hostname(address: u32) -> String {
    Ipv4Addr::from(address).to_string()
}

/// First IPv4 address of `hostname`.
///
/// An unresolvable name yields the loopback address; a name that resolves
/// only to non-IPv4 addresses yields `0`.
#[must_use]
pub fn hostname_to_address(hostname: &str) -> u32 {
    let addrs = match (hostname, 0u16).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            log::debug!("[NET] resolve {} failed ({}), using loopback", hostname, e);
            return LOOPBACK_ADDRESS;
        }
    };
    addrs
        .map(|a| a.ip())
        .find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(u32::from(v4)),
            IpAddr::V6(_) => None,
        })
        .unwrap_or(0)
}

/// Name of this host.
pub fn hostname() -> Result<String> {
    let mut buf = [0u8; HOSTNAME_MAX];
    // SAFETY: buf is writable for HOSTNAME_MAX bytes.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        let e = Error::last_os_error();
        diag!("gethostname", e);
        return Err(e);
    }
    // Truncated names may lack a terminator.
    buf[HOSTNAME_MAX - 1] = 0;
    let name = CStr::from_bytes_until_nul(&buf)
        .map_err(|_| Error::InvalidState("hostname is not terminated".into()))?;
    Ok(name.to_string_lossy().into_owned())
}

/// IPv4 address of this host, or `0` if the hostname is unavailable.
#[must_use]
pub fn host_address() -> u32 {
    match hostname() {
        Ok(name) => hostname_to_address(&name),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_to_hostname() {
        assert_eq!(address_to_hostname(LOOPBACK_ADDRESS), "127.0.0.1");
        assert_eq!(address_to_hostname(0xC0A8_01FF), "192.168.1.255");
        assert_eq!(address_to_hostname(0), "0.0.0.0");
    }

    #[test]
    fn test_dotted_quad_roundtrip() {
        let text = address_to_hostname(0x0A01_0203);
        assert_eq!(hostname_to_address(&text), 0x0A01_0203);
    }

    #[test]
    fn test_unresolvable_falls_back_to_loopback() {
        assert_eq!(
            hostname_to_address("no-such-host.invalid"),
            LOOPBACK_ADDRESS
        );
    }

    #[test]
    fn test_ipv6_only_is_zero() {
        assert_eq!(hostname_to_address("::1"), 0);
    }

    #[test]
    fn test_hostname_available() {
        let name = hostname().expect("hostname");
        assert!(!name.is_empty());
        assert_ne!(host_address(), 0);
    }
}
