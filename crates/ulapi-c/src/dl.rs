// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic loader for C callers.
//!
//! Loader messages are copied into the caller's buffer, truncated and always
//! NUL-terminated. A successful call leaves an empty string there.

use crate::{path_arg, str_arg};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use ulapi::{Error, Library};

/// Opaque handle to a loaded shared object.
#[repr(C)]
pub struct UlapiLibrary {
    _private: [u8; 0],
}

/// Copy `msg` into `errstr[..errlen]`, truncating and terminating.
unsafe fn write_errstr(errstr: *mut c_char, errlen: c_int, msg: &str) {
    let Ok(cap) = usize::try_from(errlen) else {
        return;
    };
    if errstr.is_null() || cap == 0 {
        return;
    }
    let n = msg.len().min(cap - 1);
    // SAFETY: caller guarantees errstr is writable for errlen bytes; n < errlen.
    unsafe {
        ptr::copy_nonoverlapping(msg.as_ptr().cast::<c_char>(), errstr, n);
        *errstr.add(n) = 0;
    }
}

fn error_text(e: &Error) -> String {
    match e {
        Error::Loader(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Load the shared object `objname`.
///
/// # Returns
/// Handle, or NULL with the loader message in `errstr`.
///
/// `objname` is passed to the loader byte for byte.
///
/// # Safety
/// - `objname` must be a valid NUL-terminated string.
/// - `errstr` must be NULL or writable for `errlen` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_dl_open(
    objname: *const c_char,
    errstr: *mut c_char,
    errlen: c_int,
) -> *mut UlapiLibrary {
    match path_arg(objname).and_then(Library::open) {
        Ok(lib) => {
            write_errstr(errstr, errlen, "");
            Box::into_raw(Box::new(lib)).cast::<UlapiLibrary>()
        }
        Err(e) => {
            write_errstr(errstr, errlen, &error_text(&e));
            ptr::null_mut()
        }
    }
}

/// Unload. NULL is ignored.
///
/// # Safety
/// `handle` must come from `ulapi_dl_open` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_dl_close(handle: *mut UlapiLibrary) {
    if handle.is_null() {
        return;
    }
    let lib = Box::from_raw(handle.cast::<Library>());
    if let Err(e) = lib.close() {
        log::debug!("[DL] {}", e);
    }
}

/// Address of symbol `name`.
///
/// # Returns
/// Address, or NULL with the loader message in `errstr`.
///
/// # Safety
/// - `handle` must come from `ulapi_dl_open`.
/// - `name` must be a valid NUL-terminated string.
/// - `errstr` must be NULL or writable for `errlen` bytes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_dl_sym(
    handle: *mut UlapiLibrary,
    name: *const c_char,
    errstr: *mut c_char,
    errlen: c_int,
) -> *mut c_void {
    let result = match handle.cast::<Library>().as_ref() {
        Some(lib) => str_arg(name).and_then(|name| lib.sym(name)),
        None => Err(Error::BadArgs("NULL library handle".into())),
    };
    match result {
        Ok(sym) => {
            write_errstr(errstr, errlen, "");
            sym.as_ptr()
        }
        Err(e) => {
            write_errstr(errstr, errlen, &error_text(&e));
            ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{CStr, CString};

    #[test]
    fn test_errstr_truncated() {
        let mut buf = [0x7f as c_char; 8];
        // SAFETY: buf is writable for its full length.
        unsafe { write_errstr(buf.as_mut_ptr(), 8, "a long loader message") };
        // SAFETY: write_errstr always terminates within errlen.
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(text.to_bytes(), b"a long ");
    }

    #[test]
    fn test_missing_object() {
        let name = CString::new("libulapi-missing.so").expect("cstring");
        let mut buf = [0 as c_char; 256];
        // SAFETY: valid string and buffer.
        let handle = unsafe { ulapi_dl_open(name.as_ptr(), buf.as_mut_ptr(), 256) };
        assert!(handle.is_null());
        // SAFETY: buffer was terminated by ulapi_dl_open.
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
        assert!(!text.to_bytes().is_empty());
    }

    #[test]
    fn test_non_utf8_object_name() {
        let name = CString::new(&b"libulapi-\xfe-missing.so"[..]).expect("cstring");
        let mut buf = [0 as c_char; 256];
        // SAFETY: valid string and buffer.
        let handle = unsafe { ulapi_dl_open(name.as_ptr(), buf.as_mut_ptr(), 256) };
        assert!(handle.is_null());
        // SAFETY: buffer was terminated by ulapi_dl_open.
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy();
        assert!(!text.contains("UTF-8"), "{text}");
        assert!(text.contains("libulapi-"), "{text}");
    }

    #[test]
    fn test_close_null() {
        // SAFETY: NULL is a documented no-op.
        unsafe { ulapi_dl_close(ptr::null_mut()) };
    }
}
