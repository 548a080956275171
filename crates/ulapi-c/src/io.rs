// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic descriptors and serial ports for C callers.
//!
//! `ulapi_serial_*` are the `ulapi_fd_*` calls under another name.

use crate::{buf_mut, buf_ref, byte_count, path_arg, result_code, ULAPI_BAD_ARGS, ULAPI_OK};
use std::os::raw::{c_char, c_int};
use ulapi::{Descriptor, Error, Result, StdStream};

/// Standard input selector for `ulapi_std_open`.
pub const ULAPI_STDIN: c_int = 0;
/// Standard output selector for `ulapi_std_open`.
pub const ULAPI_STDOUT: c_int = 1;
/// Standard error selector for `ulapi_std_open`.
pub const ULAPI_STDERR: c_int = 2;

/// Opaque handle to a descriptor.
#[repr(C)]
pub struct UlapiFd {
    _private: [u8; 0],
}

/// Serial ports share the descriptor handle.
pub type UlapiSerial = UlapiFd;

unsafe fn fd_ref<'a>(id: *mut UlapiFd) -> Result<&'a mut Descriptor> {
    // SAFETY: caller guarantees id is NULL or came from ulapi_fd_new.
    unsafe { id.cast::<Descriptor>().as_mut() }
        .ok_or_else(|| Error::BadArgs("NULL descriptor handle".into()))
}

// ============================================================================
// Descriptor
// ============================================================================

/// Allocate an unopened descriptor handle.
///
/// # Safety
/// Release with `ulapi_fd_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_new() -> *mut UlapiFd {
    Box::into_raw(Box::new(Descriptor::new())).cast::<UlapiFd>()
}

/// Close (if open) and free the handle.
///
/// # Safety
/// `id` must come from `ulapi_fd_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_delete(id: *mut UlapiFd) -> c_int {
    if id.is_null() {
        return ULAPI_BAD_ARGS;
    }
    let mut fd = Box::from_raw(id.cast::<Descriptor>());
    result_code(fd.close())
}

/// Bind `id` to standard stream `io` (`ULAPI_STDIN`, `ULAPI_STDOUT`, `ULAPI_STDERR`).
///
/// # Safety
/// `id` must come from `ulapi_fd_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_std_open(io: c_int, id: *mut UlapiFd) -> c_int {
    result_code(
        StdStream::try_from(io).and_then(|stream| fd_ref(id).and_then(|fd| fd.open_std(stream))),
    )
}

/// Open the file or device at `path` read-write into `id`.
///
/// `path` is taken as raw bytes; it need not be UTF-8.
///
/// # Safety
/// - `path` must be a valid NUL-terminated string.
/// - `id` must come from `ulapi_fd_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_open(path: *const c_char, id: *mut UlapiFd) -> c_int {
    result_code(path_arg(path).and_then(|path| fd_ref(id).and_then(|fd| fd.open(path))))
}

/// Make reads and writes return immediately.
///
/// # Safety
/// `id` must come from `ulapi_fd_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_set_nonblocking(id: *mut UlapiFd) -> c_int {
    result_code(fd_ref(id).and_then(|fd| fd.set_nonblocking()))
}

/// Make reads and writes block.
///
/// # Safety
/// `id` must come from `ulapi_fd_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_set_blocking(id: *mut UlapiFd) -> c_int {
    result_code(fd_ref(id).and_then(|fd| fd.set_blocking()))
}

/// Read up to `len` bytes; -1 on failure.
///
/// # Safety
/// - `id` must come from `ulapi_fd_new`.
/// - `buf` must be writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_read(id: *mut UlapiFd, buf: *mut c_char, len: c_int) -> c_int {
    byte_count(buf_mut(buf, len).and_then(|buf| fd_ref(id).and_then(|fd| fd.read(buf))))
}

/// Write up to `len` bytes; -1 on failure.
///
/// # Safety
/// - `id` must come from `ulapi_fd_new`.
/// - `buf` must be readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_write(id: *mut UlapiFd, buf: *const c_char, len: c_int) -> c_int {
    byte_count(buf_ref(buf, len).and_then(|buf| fd_ref(id).and_then(|fd| fd.write(buf))))
}

/// Close the descriptor; the handle stays allocated and may be reopened.
/// Standard streams are unbound, never closed.
///
/// # Safety
/// `id` must come from `ulapi_fd_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_fd_close(id: *mut UlapiFd) -> c_int {
    result_code(fd_ref(id).and_then(Descriptor::close))
}

// ============================================================================
// Serial
// ============================================================================

/// See `ulapi_fd_new`.
///
/// # Safety
/// Release with `ulapi_serial_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_new() -> *mut UlapiSerial {
    ulapi_fd_new()
}

/// See `ulapi_fd_delete`.
///
/// # Safety
/// `id` must come from `ulapi_serial_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_delete(id: *mut UlapiSerial) -> c_int {
    ulapi_fd_delete(id)
}

/// Open the serial device `port` (e.g. `/dev/ttyS0`) into `id`.
///
/// # Safety
/// - `port` must be a valid NUL-terminated string.
/// - `id` must come from `ulapi_serial_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_open(port: *const c_char, id: *mut UlapiSerial) -> c_int {
    ulapi_fd_open(port, id)
}

/// See `ulapi_fd_set_nonblocking`.
///
/// # Safety
/// `id` must come from `ulapi_serial_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_set_nonblocking(id: *mut UlapiSerial) -> c_int {
    ulapi_fd_set_nonblocking(id)
}

/// See `ulapi_fd_set_blocking`.
///
/// # Safety
/// `id` must come from `ulapi_serial_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_set_blocking(id: *mut UlapiSerial) -> c_int {
    ulapi_fd_set_blocking(id)
}

/// See `ulapi_fd_read`.
///
/// # Safety
/// As `ulapi_fd_read`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_read(
    id: *mut UlapiSerial,
    buf: *mut c_char,
    len: c_int,
) -> c_int {
    ulapi_fd_read(id, buf, len)
}

/// See `ulapi_fd_write`.
///
/// # Safety
/// As `ulapi_fd_write`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_write(
    id: *mut UlapiSerial,
    buf: *const c_char,
    len: c_int,
) -> c_int {
    ulapi_fd_write(id, buf, len)
}

/// See `ulapi_fd_close`.
///
/// # Safety
/// `id` must come from `ulapi_serial_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_serial_close(id: *mut UlapiSerial) -> c_int {
    ulapi_fd_close(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ULAPI_ERROR;
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    #[test]
    fn test_file_roundtrip() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let path = CString::new(file.path().as_os_str().as_bytes()).expect("cstring");
        // SAFETY: handle and buffers are valid for the whole block.
        unsafe {
            let id = ulapi_serial_new();
            assert_eq!(ulapi_serial_open(path.as_ptr(), id), ULAPI_OK);
            assert_eq!(ulapi_serial_write(id, b"abc".as_ptr().cast(), 3), 3);
            assert_eq!(ulapi_serial_close(id), ULAPI_OK);

            assert_eq!(ulapi_fd_open(path.as_ptr(), id), ULAPI_OK);
            let mut buf = [0 as c_char; 8];
            assert_eq!(ulapi_fd_read(id, buf.as_mut_ptr(), 8), 3);
            assert_eq!(ulapi_fd_delete(id), ULAPI_OK);
        }
    }

    #[test]
    fn test_open_non_utf8_path() {
        use std::ffi::OsStr;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(OsStr::from_bytes(b"ulapi-\xff.dat"));
        std::fs::write(&path, b"raw").expect("create");
        let c_path = CString::new(path.as_os_str().as_bytes()).expect("cstring");
        // SAFETY: handle and buffers are valid for the whole block.
        unsafe {
            let id = ulapi_serial_new();
            assert_eq!(ulapi_serial_open(c_path.as_ptr(), id), ULAPI_OK);
            let mut buf = [0 as c_char; 8];
            assert_eq!(ulapi_serial_read(id, buf.as_mut_ptr(), 8), 3);
            assert_eq!(ulapi_serial_delete(id), ULAPI_OK);
        }
    }

    #[test]
    fn test_std_open() {
        // SAFETY: handle is created and freed here.
        unsafe {
            let id = ulapi_fd_new();
            assert_eq!(ulapi_std_open(9, id), ULAPI_BAD_ARGS);
            assert_eq!(ulapi_std_open(ULAPI_STDERR, id), ULAPI_OK);
            assert_eq!(ulapi_fd_write(id, std::ptr::null(), 0), 0);
            assert_eq!(ulapi_fd_close(id), ULAPI_OK);
            assert_eq!(ulapi_fd_set_blocking(id), ULAPI_ERROR);
            assert_eq!(ulapi_fd_delete(id), ULAPI_OK);
        }
    }
}
