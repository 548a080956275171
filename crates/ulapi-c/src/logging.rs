// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Console logging driven by the diagnostic mask.
//!
//! `ulapi_logging_init(ULAPI_DEBUG_INFO)` both enables lifecycle reports
//! and installs a logger verbose enough to print them.

use crate::{result_code, str_arg};
use std::os::raw::{c_char, c_int};

/// Set the diagnostic mask to `mask` (`ULAPI_DEBUG_*` bits) and install a
/// console logger at the matching level.
///
/// # Returns
/// `ULAPI_ERROR` if a logger is already installed; the mask is set anyway.
///
/// # Safety
/// No pointer arguments.
///
/// # Example (C)
/// ```c
/// ulapi_logging_init(ULAPI_DEBUG_ERROR | ULAPI_DEBUG_INFO);
/// ```
#[no_mangle]
pub unsafe extern "C" fn ulapi_logging_init(mask: c_int) -> c_int {
    result_code(ulapi::logging::init_for_mask(mask as u32))
}

/// As `ulapi_logging_init`, but `RUST_LOG` overrides the level the mask
/// selects.
///
/// # Safety
/// No pointer arguments.
#[no_mangle]
pub unsafe extern "C" fn ulapi_logging_init_env(mask: c_int) -> c_int {
    let mask = mask as u32;
    ulapi::debug::set_debug(mask);
    result_code(ulapi::logging::init_from_env(ulapi::logging::level_for_mask(mask)))
}

/// Install a console logger with a filter string such as `"ulapi=debug,info"`.
/// The diagnostic mask is left unchanged.
///
/// # Returns
/// `ULAPI_BAD_ARGS` for NULL or empty filters
///
/// # Safety
/// `filter` must be a valid NUL-terminated C string or NULL.
#[no_mangle]
pub unsafe extern "C" fn ulapi_logging_init_with_filter(filter: *const c_char) -> c_int {
    result_code(str_arg(filter).and_then(ulapi::logging::init_with_filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ULAPI_BAD_ARGS, ULAPI_DEBUG_ALL, ULAPI_DEBUG_ERROR};

    #[test]
    fn test_init_applies_mask() {
        let saved = ulapi::debug::debug_mask();
        // SAFETY: no pointers; a logger may already exist, the mask is set regardless.
        unsafe {
            let _ = ulapi_logging_init(ULAPI_DEBUG_ERROR);
            assert_eq!(ulapi::debug::debug_mask(), ULAPI_DEBUG_ERROR as u32);
            let _ = ulapi_logging_init_env(ULAPI_DEBUG_ALL);
            assert_eq!(ulapi::debug::debug_mask(), ULAPI_DEBUG_ALL as u32);
        }
        ulapi::debug::set_debug(saved);
    }

    #[test]
    fn test_null_filter() {
        // SAFETY: NULL is rejected before dereference.
        assert_eq!(
            unsafe { ulapi_logging_init_with_filter(std::ptr::null()) },
            ULAPI_BAD_ARGS
        );
    }
}
