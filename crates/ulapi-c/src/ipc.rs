// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared memory and FIFOs for C callers.
//!
//! FIFOs are handed out as bare descriptors. The context keeps the owning
//! [`Fifo`] in a registry keyed by descriptor until `ulapi_fifo_delete`.

use crate::{buf_mut, buf_ref, byte_count, result_code, with_state, ULAPI_BAD_ARGS, ULAPI_OK};
use std::os::raw::{c_char, c_int, c_void};
use std::os::unix::io::AsRawFd;
use std::ptr;
use ulapi::{Error, IpcKey, SharedMemory};

/// Opaque handle to an attached shared memory segment.
#[repr(C)]
pub struct UlapiShm {
    _private: [u8; 0],
}

// ============================================================================
// Shared memory
// ============================================================================

/// Attach to the segment named `key`, creating it with `size` bytes if needed.
///
/// # Returns
/// NULL before `ulapi_init`, for key 0 or size 0, or on system failure.
///
/// # Safety
/// Release with `ulapi_shm_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_shm_new(key: c_int, size: usize) -> *mut UlapiShm {
    let result = IpcKey::new(key).and_then(|key| with_state(|state| state.ulapi.shm_new(key, size)));
    match result {
        Ok(shm) => Box::into_raw(Box::new(shm)).cast::<UlapiShm>(),
        Err(e) => {
            log::debug!("[SHM] shm_new({}, {}) failed: {}", key, size, e);
            ptr::null_mut()
        }
    }
}

/// Base address of the segment in this process.
///
/// # Safety
/// `shm` must come from `ulapi_shm_new` (or be NULL, which yields NULL).
#[no_mangle]
pub unsafe extern "C" fn ulapi_shm_addr(shm: *mut UlapiShm) -> *mut c_void {
    match shm.cast::<SharedMemory>().as_ref() {
        Some(shm) => shm.as_ptr().cast::<c_void>(),
        None => ptr::null_mut(),
    }
}

/// Detach and free the handle; the segment is destroyed once no process
/// remains attached.
///
/// # Safety
/// `shm` must come from `ulapi_shm_new`. Pointers obtained from
/// `ulapi_shm_addr` are dangling afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_shm_delete(shm: *mut UlapiShm) -> c_int {
    if shm.is_null() {
        return ULAPI_BAD_ARGS;
    }
    let shm = *Box::from_raw(shm.cast::<SharedMemory>());
    if crate::initialized() {
        result_code(with_state(move |state| state.ulapi.shm_delete(shm)))
    } else {
        // Backend gone: tear the segment down directly.
        result_code(shm.delete())
    }
}

// ============================================================================
// FIFOs
// ============================================================================

/// Open (creating if needed) the FIFO for `key` with capacity `size`.
///
/// # Safety
/// `fd` must be valid for writes; it receives the descriptor.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fifo_new(key: c_int, fd: *mut c_int, size: c_int) -> c_int {
    if fd.is_null() {
        return ULAPI_BAD_ARGS;
    }
    *fd = -1;
    let Ok(size) = usize::try_from(size) else {
        return ULAPI_BAD_ARGS;
    };
    let result = with_state(|state| {
        let fifo = state.ulapi.fifo_new(key, size)?;
        let raw = fifo.as_raw_fd();
        state.fifos.lock().insert(raw, fifo);
        Ok(raw)
    });
    match result {
        Ok(raw) => {
            *fd = raw;
            ULAPI_OK
        }
        Err(e) => result_code(Err(e)),
    }
}

/// Close `fd` and unlink the FIFO for `key`.
///
/// # Safety
/// `fd` must come from `ulapi_fifo_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fifo_delete(key: c_int, fd: c_int, _size: c_int) -> c_int {
    result_code(with_state(|state| {
        let fifo = state
            .fifos
            .lock()
            .remove(&fd)
            .ok_or_else(|| not_a_fifo(fd))?;
        if fifo.key() != key {
            let found = fifo.key();
            state.fifos.lock().insert(fd, fifo);
            return Err(Error::BadArgs(format!("fd {fd} belongs to key {found}, not {key}")));
        }
        state.ulapi.fifo_delete(fifo)
    }))
}

/// Read up to `size` bytes without blocking.
///
/// # Returns
/// Bytes read, or -1 (including when nothing is available).
///
/// # Safety
/// `buf` must be writable for `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fifo_read(fd: c_int, buf: *mut c_char, size: c_int) -> c_int {
    byte_count(buf_mut(buf, size).and_then(|buf| {
        with_state(|state| {
            let fifos = state.fifos.lock();
            let fifo = fifos.get(&fd).ok_or_else(|| not_a_fifo(fd))?;
            state.ulapi.fifo_read(fifo, buf)
        })
    }))
}

/// Write up to `size` bytes without blocking.
///
/// # Returns
/// Bytes written, or -1 (including when the FIFO is full).
///
/// # Safety
/// `buf` must be readable for `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fifo_write(fd: c_int, buf: *const c_char, size: c_int) -> c_int {
    byte_count(buf_ref(buf, size).and_then(|buf| {
        with_state(|state| {
            let fifos = state.fifos.lock();
            let fifo = fifos.get(&fd).ok_or_else(|| not_a_fifo(fd))?;
            state.ulapi.fifo_write(fifo, buf)
        })
    }))
}

fn not_a_fifo(fd: c_int) -> Error {
    Error::BadArgs(format!("fd {fd} is not an open FIFO"))
}
