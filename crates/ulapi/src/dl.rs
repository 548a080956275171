// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic loading of shared objects.
//!
//! Thin layer over `dlopen`/`dlsym`/`dlclose`. Failures carry the loader's
//! own message in [`Error::Loader`].

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::ffi::{c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

/// `dlerror` state is process-wide; serialise the call/read pairs.
static DL_LOCK: Mutex<()> = Mutex::new(());

/// Loaded shared object.
#[derive(Debug)]
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
}

// SAFETY: a dlopen handle is a process-wide token usable from any thread.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    /// Load `path` with lazy symbol binding.
    ///
    /// A path without `/` is searched the way the system loader searches.
    /// The path is passed through byte for byte; it need not be UTF-8.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| Error::BadArgs(format!("{} contains NUL", path.display())))?;
        let _guard = DL_LOCK.lock();
        clear_dlerror();
        // SAFETY: c_path is NUL-terminated and outlives the call.
        let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY) };
        match NonNull::new(raw) {
            Some(handle) => {
                log::debug!("[DL] opened {}", path.display());
                Ok(Self {
                    handle,
                    name: path.to_string_lossy().into_owned(),
                })
            }
            None => Err(Error::Loader(
                take_dlerror().unwrap_or_else(|| format!("cannot open {}", path.display())),
            )),
        }
    }

    /// Name the library was opened with, lossily decoded.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of symbol `name`.
    ///
    /// A symbol whose value is legitimately null is returned as an error,
    /// since callers need a usable address.
    pub fn sym(&self, name: &str) -> Result<NonNull<c_void>> {
        let c_name = to_cstring(name)?;
        let _guard = DL_LOCK.lock();
        clear_dlerror();
        // SAFETY: handle came from a successful dlopen and is still open
        // (close consumes self); c_name is NUL-terminated.
        let raw = unsafe { libc::dlsym(self.handle.as_ptr(), c_name.as_ptr()) };
        if let Some(msg) = take_dlerror() {
            return Err(Error::Loader(msg));
        }
        NonNull::new(raw).ok_or_else(|| Error::Loader(format!("symbol {} is null", name)))
    }

    /// Unload.
    pub fn close(self) -> Result<()> {
        let handle = self.handle;
        std::mem::forget(self);
        close_handle(handle)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        let _ = close_handle(self.handle);
    }
}

fn close_handle(handle: NonNull<c_void>) -> Result<()> {
    let _guard = DL_LOCK.lock();
    clear_dlerror();
    // SAFETY: handle came from dlopen and is closed exactly once.
    if unsafe { libc::dlclose(handle.as_ptr()) } != 0 {
        return Err(Error::Loader(
            take_dlerror().unwrap_or_else(|| "dlclose failed".to_string()),
        ));
    }
    Ok(())
}

fn to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::BadArgs(format!("{:?} contains NUL", s)))
}

fn clear_dlerror() {
    // SAFETY: dlerror has no arguments; the result is discarded.
    unsafe {
        libc::dlerror();
    }
}

fn take_dlerror() -> Option<String> {
    // SAFETY: dlerror returns null or a NUL-terminated string valid until
    // the next dl* call on this thread; it is copied before DL_LOCK drops.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        None
    } else {
        // SAFETY: non-null result of dlerror, see above.
        Some(unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    const LIBC: &str = "libc.so.6";
    #[cfg(not(target_os = "linux"))]
    const LIBC: &str = "libc.dylib";

    #[test]
    fn test_open_and_call_symbol() {
        let lib = Library::open(LIBC).expect("open libc");
        assert_eq!(lib.name(), LIBC);
        let sym = lib.sym("getpid").expect("getpid");

        // SAFETY: getpid has this exact signature in libc.
        let getpid: extern "C" fn() -> libc::pid_t = unsafe { std::mem::transmute(sym.as_ptr()) };
        assert_eq!(getpid() as u32, std::process::id());
        lib.close().expect("close");
    }

    #[test]
    fn test_missing_library_message() {
        match Library::open("libulapi-does-not-exist.so") {
            Err(Error::Loader(msg)) => assert!(msg.contains("libulapi-does-not-exist")),
            other => panic!("expected loader error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_symbol() {
        let lib = Library::open(LIBC).expect("open libc");
        assert!(matches!(
            lib.sym("ulapi_no_such_symbol"),
            Err(Error::Loader(_))
        ));
    }

    #[test]
    fn test_non_utf8_name_reaches_loader() {
        use std::ffi::OsStr;
        let name = OsStr::from_bytes(b"libulapi-\xff-missing.so");
        match Library::open(name) {
            Err(Error::Loader(msg)) => assert!(msg.contains("libulapi-"), "{msg}"),
            other => panic!("expected loader error, got {:?}", other),
        }
    }

    #[test]
    fn test_nul_in_name() {
        assert!(matches!(Library::open("a\0b"), Err(Error::BadArgs(_))));
    }
}
