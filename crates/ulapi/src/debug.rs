// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide diagnostic verbosity.
//!
//! The mask only controls whether failed system calls are also reported
//! through the `log` facade. It never changes what an operation returns.

use std::sync::atomic::{AtomicU32, Ordering};

/// Report failed system calls.
pub const DEBUG_ERROR: u32 = 0x0000_0001;
/// Report recoverable anomalies (fallbacks, best-effort settings that failed).
pub const DEBUG_WARNING: u32 = 0x0000_0002;
/// Report resource lifecycle events.
pub const DEBUG_INFO: u32 = 0x0000_0004;
/// Every category.
pub const DEBUG_ALL: u32 = DEBUG_ERROR | DEBUG_WARNING | DEBUG_INFO;

static DEBUG_MASK: AtomicU32 = AtomicU32::new(0);

/// Replace the diagnostic mask.
pub fn set_debug(mask: u32) {
    DEBUG_MASK.store(mask, Ordering::Relaxed);
}

/// Current diagnostic mask.
#[must_use]
pub fn debug_mask() -> u32 {
    DEBUG_MASK.load(Ordering::Relaxed)
}

/// `true` if any bit of `category` is enabled.
#[inline]
#[must_use]
pub fn debug_enabled(category: u32) -> bool {
    debug_mask() & category != 0
}

/// Emit a diagnostic for a failed system call when `DEBUG_ERROR` is set.
///
/// ```ignore
/// diag!("bind", err);
/// ```
macro_rules! diag {
    ($call:expr, $err:expr) => {
        if $crate::debug::debug_enabled($crate::debug::DEBUG_ERROR) {
            log::warn!("[ULAPI] {}: {}", $call, $err);
        }
    };
}

pub(crate) use diag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_roundtrip() {
        let saved = debug_mask();

        set_debug(DEBUG_ERROR | DEBUG_INFO);
        assert!(debug_enabled(DEBUG_ERROR));
        assert!(debug_enabled(DEBUG_INFO));
        assert!(!debug_enabled(DEBUG_WARNING));
        assert!(debug_enabled(DEBUG_ALL));

        set_debug(0);
        assert!(!debug_enabled(DEBUG_ALL));

        set_debug(saved);
    }
}
