// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sockets as integer descriptors.
//!
//! Constructors release ownership of the descriptor to the caller; every
//! other call borrows it and never closes it, except `ulapi_socket_close`.

use crate::{buf_mut, buf_ref, byte_count, result_code, str_arg, ULAPI_BAD_ARGS};
use std::cell::RefCell;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};
use std::os::unix::io::IntoRawFd;
use ulapi::{net, Error, Result, Socket, SocketRole};

thread_local! {
    static HOSTNAME_BUF: RefCell<CString> = RefCell::new(CString::default());
}

fn port_arg(port: c_int) -> Result<u16> {
    u16::try_from(port).map_err(|_| Error::BadArgs(format!("port {port} out of range")))
}

fn descriptor(result: Result<Socket>) -> c_int {
    match result {
        Ok(socket) => socket.into_raw_fd(),
        Err(e) => {
            log::debug!("[NET] {}", e);
            -1
        }
    }
}

/// Borrow `fd` as a socket without taking ownership.
fn borrowed(fd: c_int, role: SocketRole) -> Result<ManuallyDrop<Socket>> {
    if fd < 0 {
        return Err(Error::BadArgs(format!("invalid socket fd {fd}")));
    }
    // SAFETY: the caller of the enclosing FFI function owns fd; ManuallyDrop
    // keeps it open when the borrow ends.
    Ok(ManuallyDrop::new(unsafe { Socket::from_raw_fd_with_role(fd, role) }))
}

// ============================================================================
// Constructors
// ============================================================================

/// Connect to `hostname:port`.
///
/// # Returns
/// Connected descriptor, or -1.
///
/// # Safety
/// `hostname` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_get_client_id(port: c_int, hostname: *const c_char) -> c_int {
    descriptor(
        port_arg(port).and_then(|port| str_arg(hostname).and_then(|h| Socket::client(port, h))),
    )
}

/// Listen on `port` on all interfaces.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_get_server_id(port: c_int) -> c_int {
    descriptor(port_arg(port).and_then(Socket::server))
}

/// Block until a client connects to the listening descriptor `socket_fd`.
///
/// # Safety
/// `socket_fd` must come from `ulapi_socket_get_server_id`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_get_connection_id(socket_fd: c_int) -> c_int {
    descriptor(borrowed(socket_fd, SocketRole::Server).and_then(|server| server.accept()))
}

/// Datagram socket allowed to broadcast.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_get_broadcaster_id() -> c_int {
    descriptor(Socket::broadcaster())
}

/// Datagram socket bound to `port` for receiving broadcasts.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_get_broadcastee_id(port: c_int) -> c_int {
    descriptor(port_arg(port).and_then(Socket::broadcastee))
}

// ============================================================================
// Addresses
// ============================================================================

/// Dotted-quad text of a host-order address.
///
/// The string lives in a per-thread buffer overwritten by the next call.
///
/// # Safety
/// Do not free the result.
#[no_mangle]
pub unsafe extern "C" fn ulapi_address_to_hostname(address: u32) -> *const c_char {
    let text = net::address_to_hostname(address);
    HOSTNAME_BUF.with(|buf| {
        let mut buf = buf.borrow_mut();
        // Dotted quads never contain NUL.
        *buf = CString::new(text).unwrap_or_default();
        buf.as_ptr()
    })
}

/// First IPv4 address of `hostname` in host order (loopback if unresolvable).
///
/// # Safety
/// `hostname` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ulapi_hostname_to_address(hostname: *const c_char) -> u32 {
    match str_arg(hostname) {
        Ok(h) => net::hostname_to_address(h),
        Err(_) => ulapi::config::LOOPBACK_ADDRESS,
    }
}

/// IPv4 address of this host, or 0.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_get_host_address() -> u32 {
    net::host_address()
}

// ============================================================================
// I/O
// ============================================================================

/// Make reads and writes on `fd` return immediately.
///
/// # Safety
/// `fd` must be an open socket descriptor.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_set_nonblocking(fd: c_int) -> c_int {
    result_code(borrowed(fd, SocketRole::Connection).and_then(|s| s.set_nonblocking()))
}

/// Make reads and writes on `fd` block.
///
/// # Safety
/// `fd` must be an open socket descriptor.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_set_blocking(fd: c_int) -> c_int {
    result_code(borrowed(fd, SocketRole::Connection).and_then(|s| s.set_blocking()))
}

/// Read up to `len` bytes.
///
/// # Returns
/// Bytes read (0 at end of stream), or -1.
///
/// # Safety
/// - `id` must be an open socket descriptor.
/// - `buf` must be writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_read(id: c_int, buf: *mut c_char, len: c_int) -> c_int {
    byte_count(
        buf_mut(buf, len)
            .and_then(|buf| borrowed(id, SocketRole::Connection).and_then(|s| s.read(buf))),
    )
}

/// Write up to `len` bytes.
///
/// # Safety
/// - `id` must be an open socket descriptor.
/// - `buf` must be readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_write(id: c_int, buf: *const c_char, len: c_int) -> c_int {
    byte_count(
        buf_ref(buf, len)
            .and_then(|buf| borrowed(id, SocketRole::Connection).and_then(|s| s.write(buf))),
    )
}

/// Send one datagram to `port` on this host's subnet broadcast address.
///
/// # Safety
/// - `id` must come from `ulapi_socket_get_broadcaster_id`.
/// - `buf` must be readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_broadcast(
    id: c_int,
    port: c_int,
    buf: *const c_char,
    len: c_int,
) -> c_int {
    byte_count(buf_ref(buf, len).and_then(|buf| {
        let port = port_arg(port)?;
        borrowed(id, SocketRole::Broadcaster).and_then(|s| s.broadcast(port, buf))
    }))
}

/// Close a socket descriptor.
///
/// # Safety
/// `id` must be an open socket descriptor not used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_socket_close(id: c_int) -> c_int {
    if id < 0 {
        return ULAPI_BAD_ARGS;
    }
    match borrowed(id, SocketRole::Connection) {
        Ok(socket) => result_code(ManuallyDrop::into_inner(socket).close()),
        Err(e) => result_code(Err(e)),
    }
}
