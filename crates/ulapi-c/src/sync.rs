// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mutexes, semaphores and condition variables for C callers.
//!
//! Mutexes and condition variables are process-local; the key argument is
//! accepted for source compatibility and ignored. Semaphores are keyed
//! kernel objects shared between processes.

use crate::{result_code, ULAPI_BAD_ARGS, ULAPI_OK};
use std::os::raw::c_int;
use std::ptr;
use ulapi::{Cond, IpcKey, Mutex, Semaphore};

/// Opaque handle to a mutex.
#[repr(C)]
pub struct UlapiMutex {
    _private: [u8; 0],
}

/// Opaque handle to a semaphore.
#[repr(C)]
pub struct UlapiSem {
    _private: [u8; 0],
}

/// Opaque handle to a condition variable.
#[repr(C)]
pub struct UlapiCond {
    _private: [u8; 0],
}

// ============================================================================
// Mutex
// ============================================================================

/// Create an unlocked mutex.
///
/// # Safety
/// Release with `ulapi_mutex_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_mutex_new(_key: c_int) -> *mut UlapiMutex {
    Box::into_raw(Box::new(Mutex::new())).cast::<UlapiMutex>()
}

/// Free a mutex.
///
/// # Safety
/// `mutex` must come from `ulapi_mutex_new` (or be NULL) and must not be held.
#[no_mangle]
pub unsafe extern "C" fn ulapi_mutex_delete(mutex: *mut UlapiMutex) -> c_int {
    if mutex.is_null() {
        return ULAPI_BAD_ARGS;
    }
    drop(Box::from_raw(mutex.cast::<Mutex>()));
    ULAPI_OK
}

/// Lock, blocking until available.
///
/// # Safety
/// `mutex` must come from `ulapi_mutex_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_mutex_take(mutex: *mut UlapiMutex) -> c_int {
    match mutex.cast::<Mutex>().as_ref() {
        Some(m) => result_code(m.take()),
        None => ULAPI_BAD_ARGS,
    }
}

/// Unlock. Unlocking a mutex that is not held is `ULAPI_ERROR`.
///
/// # Safety
/// `mutex` must come from `ulapi_mutex_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_mutex_give(mutex: *mut UlapiMutex) -> c_int {
    match mutex.cast::<Mutex>().as_ref() {
        Some(m) => result_code(m.give()),
        None => ULAPI_BAD_ARGS,
    }
}

// ============================================================================
// Semaphore
// ============================================================================

/// Create or attach to the binary semaphore named by `key`.
///
/// # Returns
/// NULL for key 0 or if the kernel object cannot be created.
///
/// # Safety
/// Release with `ulapi_sem_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_sem_new(key: c_int) -> *mut UlapiSem {
    match IpcKey::new(key).and_then(Semaphore::open) {
        Ok(sem) => Box::into_raw(Box::new(sem)).cast::<UlapiSem>(),
        Err(e) => {
            log::debug!("[SEM] sem_new({}) failed: {}", key, e);
            ptr::null_mut()
        }
    }
}

/// Remove the semaphore's kernel object and free the handle.
///
/// # Safety
/// `sem` must come from `ulapi_sem_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn ulapi_sem_delete(sem: *mut UlapiSem) -> c_int {
    if sem.is_null() {
        return ULAPI_BAD_ARGS;
    }
    let sem = Box::from_raw(sem.cast::<Semaphore>());
    result_code(sem.delete())
}

/// Release. Giving an already-available semaphore leaves it available.
///
/// # Safety
/// `sem` must come from `ulapi_sem_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_sem_give(sem: *mut UlapiSem) -> c_int {
    match sem.cast::<Semaphore>().as_ref() {
        Some(s) => result_code(s.give()),
        None => ULAPI_BAD_ARGS,
    }
}

/// Acquire, blocking until available.
///
/// # Safety
/// `sem` must come from `ulapi_sem_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_sem_take(sem: *mut UlapiSem) -> c_int {
    match sem.cast::<Semaphore>().as_ref() {
        Some(s) => result_code(s.take()),
        None => ULAPI_BAD_ARGS,
    }
}

// ============================================================================
// Condition variable
// ============================================================================

/// Create a condition variable.
///
/// # Safety
/// Release with `ulapi_cond_delete`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_cond_new(_key: c_int) -> *mut UlapiCond {
    Box::into_raw(Box::new(Cond::new())).cast::<UlapiCond>()
}

/// Free a condition variable.
///
/// # Safety
/// `cond` must come from `ulapi_cond_new` and have no waiters.
#[no_mangle]
pub unsafe extern "C" fn ulapi_cond_delete(cond: *mut UlapiCond) -> c_int {
    if cond.is_null() {
        return ULAPI_BAD_ARGS;
    }
    drop(Box::from_raw(cond.cast::<Cond>()));
    ULAPI_OK
}

/// Wake one waiter.
///
/// # Safety
/// `cond` must come from `ulapi_cond_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_cond_signal(cond: *mut UlapiCond) -> c_int {
    match cond.cast::<Cond>().as_ref() {
        Some(c) => result_code(c.signal()),
        None => ULAPI_BAD_ARGS,
    }
}

/// Wake every waiter.
///
/// # Safety
/// `cond` must come from `ulapi_cond_new`.
#[no_mangle]
pub unsafe extern "C" fn ulapi_cond_broadcast(cond: *mut UlapiCond) -> c_int {
    match cond.cast::<Cond>().as_ref() {
        Some(c) => result_code(c.broadcast()),
        None => ULAPI_BAD_ARGS,
    }
}

/// Atomically release `mutex` and wait; `mutex` is held again on return.
///
/// # Safety
/// - `cond` must come from `ulapi_cond_new`.
/// - `mutex` must come from `ulapi_mutex_new` and be held by the caller.
#[no_mangle]
pub unsafe extern "C" fn ulapi_cond_wait(cond: *mut UlapiCond, mutex: *mut UlapiMutex) -> c_int {
    match (cond.cast::<Cond>().as_ref(), mutex.cast::<Mutex>().as_ref()) {
        (Some(c), Some(m)) => result_code(c.wait(m)),
        _ => ULAPI_BAD_ARGS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ULAPI_ERROR;

    #[test]
    fn test_mutex_lifecycle() {
        // SAFETY: handle is created here and freed once.
        unsafe {
            let m = ulapi_mutex_new(0);
            assert_eq!(ulapi_mutex_take(m), ULAPI_OK);
            assert_eq!(ulapi_mutex_give(m), ULAPI_OK);
            assert_eq!(ulapi_mutex_give(m), ULAPI_ERROR);
            assert_eq!(ulapi_mutex_delete(m), ULAPI_OK);
        }
    }

    #[test]
    fn test_sem_zero_key() {
        // SAFETY: key 0 returns NULL without allocating.
        assert!(unsafe { ulapi_sem_new(0) }.is_null());
    }

    #[test]
    fn test_null_rejected() {
        // SAFETY: NULL is checked before any dereference.
        unsafe {
            assert_eq!(ulapi_mutex_take(ptr::null_mut()), ULAPI_BAD_ARGS);
            assert_eq!(ulapi_sem_give(ptr::null_mut()), ULAPI_BAD_ARGS);
            assert_eq!(
                ulapi_cond_wait(ptr::null_mut(), ptr::null_mut()),
                ULAPI_BAD_ARGS
            );
        }
    }
}
