// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ULAPI C FFI Bindings
//!
//! `ulapi_*` entry points over the `ulapi` crate, with integer result codes,
//! opaque heap handles and integer descriptors.
//!
//! # Conventions
//!
//! | Return kind | Success | Failure |
//! |-------------|---------|---------|
//! | result code | `ULAPI_OK` | `ULAPI_ERROR`, `ULAPI_IMPL_ERROR`, `ULAPI_BAD_ARGS`, `ULAPI_NO_MEM` |
//! | handle | non-NULL | NULL |
//! | descriptor | `>= 0` | `-1` |
//! | byte count | `>= 0` | `-1` |
//!
//! # Safety
//!
//! All public functions are `unsafe` and require the caller to uphold the
//! invariants documented in each function's safety comment.

mod dl;
mod io;
mod ipc;
mod logging;
mod net;
mod sync;
mod task;

pub use dl::*;
pub use io::*;
pub use ipc::*;
pub use logging::*;
pub use net::*;
pub use sync::*;
pub use task::*;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString, OsStr};
use std::os::raw::{c_char, c_double, c_int};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use ulapi::{BackendMode, Error, Fifo, Result, Ulapi, UlapiConfig};

// ============================================================================
// Result codes and selectors
// ============================================================================

/// Success.
pub const ULAPI_OK: c_int = 0;
/// Generic failure.
pub const ULAPI_ERROR: c_int = 1;
/// Backend not compiled in, or operation unsupported by the active backend.
pub const ULAPI_IMPL_ERROR: c_int = 2;
/// Invalid argument.
pub const ULAPI_BAD_ARGS: c_int = 3;
/// Allocation failure.
pub const ULAPI_NO_MEM: c_int = 4;

/// Let the library choose the backend.
pub const ULAPI_USE_DEFAULT: c_int = 0;
/// General-purpose OS backend.
pub const ULAPI_USE_POSIX: c_int = 1;
/// Real-time backend.
pub const ULAPI_USE_RT: c_int = 2;

/// Report failed system calls.
pub const ULAPI_DEBUG_ERROR: c_int = 0x1;
/// Report recoverable anomalies.
pub const ULAPI_DEBUG_WARNING: c_int = 0x2;
/// Report lifecycle events.
pub const ULAPI_DEBUG_INFO: c_int = 0x4;
/// Every category.
pub const ULAPI_DEBUG_ALL: c_int = 0x7;

// ============================================================================
// Process-wide context
// ============================================================================

pub(crate) struct State {
    pub(crate) ulapi: Ulapi,
    /// FIFOs handed out as bare descriptors, keyed by fd.
    pub(crate) fifos: Mutex<HashMap<c_int, Fifo>>,
}

static STATE: ArcSwapOption<State> = ArcSwapOption::const_empty();
static INIT_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn with_state<T>(f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
    let state = STATE
        .load_full()
        .ok_or_else(|| Error::InvalidState("ulapi_init has not been called".into()))?;
    f(&state)
}

pub(crate) fn initialized() -> bool {
    STATE.load().is_some()
}

pub(crate) fn result_code(result: Result<()>) -> c_int {
    match result {
        Ok(()) => ULAPI_OK,
        Err(e) => {
            log::debug!("[ULAPI] {}", e);
            e.code().as_raw()
        }
    }
}

pub(crate) fn byte_count(result: Result<usize>) -> c_int {
    match result {
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(e) => {
            if !e.is_would_block() {
                log::debug!("[ULAPI] {}", e);
            }
            -1
        }
    }
}

/// Borrow a C buffer; `len` must be non-negative and `buf` non-NULL unless `len` is 0.
pub(crate) unsafe fn buf_ref<'a>(buf: *const c_char, len: c_int) -> Result<&'a [u8]> {
    let len = usize::try_from(len).map_err(|_| Error::BadArgs("negative length".into()))?;
    if len == 0 {
        return Ok(&[]);
    }
    if buf.is_null() {
        return Err(Error::BadArgs("NULL buffer".into()));
    }
    // SAFETY: caller guarantees buf is readable for len bytes.
    Ok(unsafe { std::slice::from_raw_parts(buf.cast::<u8>(), len) })
}

/// Mutable counterpart of [`buf_ref`].
pub(crate) unsafe fn buf_mut<'a>(buf: *mut c_char, len: c_int) -> Result<&'a mut [u8]> {
    let len = usize::try_from(len).map_err(|_| Error::BadArgs("negative length".into()))?;
    if len == 0 {
        return Ok(&mut []);
    }
    if buf.is_null() {
        return Err(Error::BadArgs("NULL buffer".into()));
    }
    // SAFETY: caller guarantees buf is writable for len bytes.
    Ok(unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), len) })
}

/// Borrow a NUL-terminated UTF-8 string.
pub(crate) unsafe fn str_arg<'a>(s: *const c_char) -> Result<&'a str> {
    if s.is_null() {
        return Err(Error::BadArgs("NULL string".into()));
    }
    // SAFETY: caller guarantees s is a valid NUL-terminated string.
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| Error::BadArgs("string is not UTF-8".into()))
}

/// Borrow a NUL-terminated path, keeping its bytes as they are.
pub(crate) unsafe fn path_arg<'a>(s: *const c_char) -> Result<&'a Path> {
    if s.is_null() {
        return Err(Error::BadArgs("NULL path".into()));
    }
    // SAFETY: caller guarantees s is a valid NUL-terminated string.
    let bytes = unsafe { CStr::from_ptr(s) }.to_bytes();
    Ok(Path::new(OsStr::from_bytes(bytes)))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initialise ULAPI with backend selector `sel` (`ULAPI_USE_*`).
///
/// `ULAPI_*` environment variables supply the rest of the configuration;
/// `ULAPI_BACKEND` is read only for `ULAPI_USE_DEFAULT`.
/// Calling it again with a selector resolving to the active backend is a
/// no-op; a different backend is `ULAPI_ERROR` until `ulapi_exit`.
///
/// # Returns
/// - `ULAPI_BAD_ARGS` for an unknown selector
/// - `ULAPI_IMPL_ERROR` if the real-time backend is not compiled in
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_init(sel: c_int) -> c_int {
    let mode = match BackendMode::try_from(sel) {
        Ok(mode) => mode,
        Err(e) => return e.code().as_raw(),
    };

    let _guard = INIT_LOCK.lock();
    if let Some(state) = STATE.load_full() {
        let wanted = match mode {
            BackendMode::Default => BackendMode::Posix,
            other => other,
        };
        return if state.ulapi.mode() == wanted {
            ULAPI_OK
        } else {
            log::debug!(
                "[ULAPI] init({}) refused: {} backend already active",
                mode,
                state.ulapi.mode()
            );
            ULAPI_ERROR
        };
    }

    let result = UlapiConfig::from_env_with_mode(mode).and_then(Ulapi::with_config);
    match result {
        Ok(ulapi) => {
            STATE.store(Some(Arc::new(State {
                ulapi,
                fifos: Mutex::new(HashMap::new()),
            })));
            ULAPI_OK
        }
        Err(e) => result_code(Err(e)),
    }
}

/// Tear ULAPI down. Backend teardown completes once calls in flight on
/// other threads return. Open FIFOs are closed.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_exit() -> c_int {
    let _guard = INIT_LOCK.lock();
    let Some(state) = STATE.swap(None) else {
        return ULAPI_OK;
    };
    match Arc::try_unwrap(state) {
        Ok(state) => {
            drop(state.fifos);
            result_code(state.ulapi.finalize())
        }
        Err(_shared) => ULAPI_OK,
    }
}

/// Replace the diagnostic mask (`ULAPI_DEBUG_*` bits).
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_set_debug(mask: c_int) {
    ulapi::debug::set_debug(mask as u32);
}

/// Current diagnostic mask.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_get_debug() -> c_int {
    ulapi::debug::debug_mask() as c_int
}

// ============================================================================
// Time
// ============================================================================

/// Monotonic time in seconds.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_time() -> c_double {
    ulapi::time::time()
}

/// Sleep `secs` seconds.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_sleep(secs: c_double) -> c_int {
    result_code(ulapi::time::sleep(secs))
}

// ============================================================================
// Process helpers
// ============================================================================

/// Split `src` into an argument vector stored in `*argv`.
///
/// # Returns
/// Argument count, or -1 on bad arguments. Release with `ulapi_free_argv`.
///
/// # Safety
/// - `src` must be a valid NUL-terminated string.
/// - `argv` must be a valid pointer to writable storage.
#[no_mangle]
pub unsafe extern "C" fn ulapi_to_argv(src: *const c_char, argv: *mut *mut *mut c_char) -> c_int {
    if argv.is_null() {
        return -1;
    }
    *argv = ptr::null_mut();
    let Ok(src) = str_arg(src) else {
        return -1;
    };

    let args = ulapi::process::to_argv(src);
    let Ok(argc) = c_int::try_from(args.len()) else {
        return -1;
    };
    if args.is_empty() {
        return 0;
    }

    let mut ptrs = Vec::with_capacity(args.len());
    for arg in args {
        // Arguments come from a C string, so they contain no NUL.
        match CString::new(arg) {
            Ok(c) => ptrs.push(c.into_raw()),
            Err(_) => {
                ulapi_free_argv(ptrs.len() as c_int, Box::into_raw(ptrs.into_boxed_slice()).cast());
                return -1;
            }
        }
    }
    *argv = Box::into_raw(ptrs.into_boxed_slice()).cast::<*mut c_char>();
    argc
}

/// Free a vector produced by `ulapi_to_argv`.
///
/// # Safety
/// `argv` must come from `ulapi_to_argv` with the same `argc`, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn ulapi_free_argv(argc: c_int, argv: *mut *mut c_char) {
    if argv.is_null() || argc <= 0 {
        return;
    }
    let slice: Box<[*mut c_char]> =
        Box::from_raw(ptr::slice_from_raw_parts_mut(argv, argc as usize));
    for &arg in slice.iter() {
        if !arg.is_null() {
            drop(CString::from_raw(arg));
        }
    }
}

/// Run `prog` through the shell, storing its exit code in `*result`.
///
/// # Safety
/// - `prog` must be a valid NUL-terminated string.
/// - `result` must be NULL or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn ulapi_system(prog: *const c_char, result: *mut c_int) -> c_int {
    let outcome = str_arg(prog).and_then(ulapi::process::system);
    match outcome {
        Ok(code) => {
            if !result.is_null() {
                *result = code;
            }
            ULAPI_OK
        }
        Err(e) => result_code(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argv_roundtrip() {
        let src = CString::new(r#"prog -x "two words""#).expect("cstring");
        let mut argv: *mut *mut c_char = ptr::null_mut();
        // SAFETY: src is a valid C string, argv is writable.
        let argc = unsafe { ulapi_to_argv(src.as_ptr(), &mut argv) };
        assert_eq!(argc, 3);
        // SAFETY: argv holds argc valid C strings.
        let third = unsafe { CStr::from_ptr(*argv.add(2)) };
        assert_eq!(third.to_str().expect("utf8"), "two words");
        // SAFETY: argv came from ulapi_to_argv with this argc.
        unsafe { ulapi_free_argv(argc, argv) };
    }

    #[test]
    fn test_empty_argv() {
        let src = CString::new("   ").expect("cstring");
        let mut argv: *mut *mut c_char = ptr::null_mut();
        // SAFETY: as above.
        assert_eq!(unsafe { ulapi_to_argv(src.as_ptr(), &mut argv) }, 0);
        assert!(argv.is_null());
    }

    #[test]
    fn test_system() {
        let cmd = CString::new("exit 7").expect("cstring");
        let mut code = 0;
        // SAFETY: valid string and out-pointer.
        assert_eq!(unsafe { ulapi_system(cmd.as_ptr(), &mut code) }, ULAPI_OK);
        assert_eq!(code, 7);
        // SAFETY: NULL is rejected, not dereferenced.
        assert_eq!(unsafe { ulapi_system(ptr::null(), &mut code) }, ULAPI_BAD_ARGS);
    }

    #[test]
    fn test_bad_selector() {
        // SAFETY: no pointers.
        assert_eq!(unsafe { ulapi_init(17) }, ULAPI_BAD_ARGS);
    }

    #[test]
    fn test_buffer_guards() {
        // SAFETY: NULL with non-zero length is rejected before any access.
        assert!(unsafe { buf_ref(ptr::null(), 4) }.is_err());
        // SAFETY: zero length never touches the pointer.
        assert!(unsafe { buf_ref(ptr::null(), 0) }.expect("empty").is_empty());
        // SAFETY: negative length is rejected.
        assert!(unsafe { buf_mut(ptr::null_mut(), -1) }.is_err());
    }
}
