// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by every ULAPI primitive.
//!
//! Rust callers see [`Error`]; the C binding collapses it onto the fixed
//! [`ResultCode`] set through [`Error::code`].

use std::fmt;
use std::io;

/// Fixed result set returned across the C boundary.
///
/// Data-transfer calls return a byte count instead (negative on error).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Operation completed successfully.
    Ok = 0,
    /// Generic failure (system call error, invalid state).
    Error = 1,
    /// Backend not compiled in, or operation not supported by it.
    ImplError = 2,
    /// Invalid argument.
    BadArgs = 3,
    /// Allocation failure.
    NoMem = 4,
}

impl ResultCode {
    /// Raw integer value.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// ULAPI error.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Argument / backend errors
    // ========================================================================
    /// Invalid argument (unknown mode, out-of-range priority, zero key...).
    BadArgs(String),
    /// The requested backend is not compiled into this image.
    Unimplemented(&'static str),
    /// The operation exists but the active backend does not support it.
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Backend name.
        backend: &'static str,
    },

    // ========================================================================
    // Resource errors
    // ========================================================================
    /// Out of memory during allocation.
    OutOfMemory,
    /// Handle is in the wrong state for the requested operation.
    InvalidState(String),

    // ========================================================================
    // System errors
    // ========================================================================
    /// Underlying system call failed.
    Io(io::Error),
    /// Dynamic loader failure, carrying the loader's message.
    Loader(String),
    /// A task's entry point panicked before it could be joined.
    TaskPanicked,
}

impl Error {
    /// Map onto the fixed C result set.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        match self {
            Error::BadArgs(_) => ResultCode::BadArgs,
            Error::Unimplemented(_) | Error::Unsupported { .. } => ResultCode::ImplError,
            Error::OutOfMemory => ResultCode::NoMem,
            Error::Io(e) if e.raw_os_error() == Some(libc::ENOMEM) => ResultCode::NoMem,
            Error::InvalidState(_) | Error::Io(_) | Error::Loader(_) | Error::TaskPanicked => {
                ResultCode::Error
            }
        }
    }

    /// `true` when the error is a non-blocking descriptor with nothing to move.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }

    /// Capture `errno` after a failed libc call.
    pub(crate) fn last_os_error() -> Self {
        Error::Io(io::Error::last_os_error())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            Error::Unimplemented(what) => write!(f, "Not compiled in: {}", what),
            Error::Unsupported { operation, backend } => {
                write!(f, "{} is not supported by the {} backend", operation, backend)
            }
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Loader(msg) => write!(f, "Loader error: {}", msg),
            Error::TaskPanicked => write!(f, "Task panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Error::BadArgs("x".into()).code(), ResultCode::BadArgs);
        assert_eq!(Error::Unimplemented("rt").code(), ResultCode::ImplError);
        assert_eq!(
            Error::Unsupported {
                operation: "pause",
                backend: "posix"
            }
            .code(),
            ResultCode::ImplError
        );
        assert_eq!(Error::OutOfMemory.code(), ResultCode::NoMem);
        assert_eq!(
            Error::Io(io::Error::from_raw_os_error(libc::ENOMEM)).code(),
            ResultCode::NoMem
        );
        assert_eq!(
            Error::Io(io::Error::from_raw_os_error(libc::EBADF)).code(),
            ResultCode::Error
        );
        assert_eq!(ResultCode::Ok.as_raw(), 0);
    }

    #[test]
    fn test_would_block() {
        let e = Error::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(e.is_would_block());
        assert!(!Error::TaskPanicked.is_would_block());
    }

    #[test]
    fn test_display() {
        let e = Error::Unsupported {
            operation: "task_pause",
            backend: "posix",
        };
        assert_eq!(
            e.to_string(),
            "task_pause is not supported by the posix backend"
        );
    }
}
