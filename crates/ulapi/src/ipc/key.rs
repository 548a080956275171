// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Keyed cross-process resources.
//!
//! Semaphores and shared memory segments are named by small integers in the
//! kernel's System V IPC key space. Cooperating processes agree on key values
//! out of band; ULAPI never allocates keys. Opening a key either attaches to
//! the existing kernel object or creates it, and reports which happened.

use crate::error::{Error, Result};
use std::fmt;

/// Non-zero System V IPC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpcKey(i32);

impl IpcKey {
    /// Validate a key.
    ///
    /// # Errors
    ///
    /// `BadArgs` for `0`, which the kernel reserves for private objects that
    /// no other process can open.
    pub fn new(key: i32) -> Result<Self> {
        if key == libc::IPC_PRIVATE {
            return Err(Error::BadArgs(
                "IPC key 0 is IPC_PRIVATE and cannot be shared".into(),
            ));
        }
        Ok(Self(key))
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    #[inline]
    pub(crate) fn as_key_t(self) -> libc::key_t {
        self.0 as libc::key_t
    }
}

impl TryFrom<i32> for IpcKey {
    type Error = Error;

    fn try_from(key: i32) -> Result<Self> {
        Self::new(key)
    }
}

impl fmt::Display for IpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Outcome of opening a keyed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// This call created the kernel object.
    Created,
    /// The kernel object already existed and was reused.
    Attached,
}

/// A kernel object identified by an [`IpcKey`] and created idempotently.
pub trait KeyedResource: Sized {
    /// Extra creation parameter (segment size, `()` for semaphores).
    type Params;

    /// Attach to the object named `key`, creating it if absent.
    fn open_keyed(key: IpcKey, params: Self::Params) -> Result<(Self, Disposition)>;

    /// Key this handle refers to.
    fn key(&self) -> IpcKey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_key_rejected() {
        assert!(matches!(IpcKey::new(0), Err(Error::BadArgs(_))));
        assert!(IpcKey::try_from(0).is_err());
    }

    #[test]
    fn test_key_roundtrip() {
        let key = IpcKey::new(42).expect("valid");
        assert_eq!(key.get(), 42);
        assert_eq!(key.to_string(), "0x2a");
        assert_eq!(IpcKey::new(-7).expect("negative keys are valid").get(), -7);
    }
}
