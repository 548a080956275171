// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Execution backends.
//!
//! Every dual-environment operation (tasks, shared memory, FIFOs) dispatches
//! through the [`Backend`] trait. Two strategies exist:
//!
//! - [`PosixBackend`] - general-purpose OS threads, virtual memory, best-effort priorities
//! - `RtBackend` - real-time scheduling with locked memory (cargo feature `rt`)
//!
//! # Mode Resolution
//!
//! | Requested | Resolved |
//! |-----------|----------|
//! | `Default` | general OS |
//! | `Posix` | general OS |
//! | `RealTime` | real-time if compiled in, else `Unimplemented` |

mod posix;
#[cfg(feature = "rt")]
mod rt;

pub use posix::PosixBackend;
#[cfg(feature = "rt")]
pub use rt::RtBackend;

use crate::error::{Error, Result};
use crate::ipc::{Fifo, IpcKey, SharedMemory};
use crate::task::{Task, TaskSpawn};
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use std::str::FromStr;
use std::time::Duration;

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-yaml", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-yaml", serde(rename_all = "lowercase"))]
#[repr(i32)]
pub enum BackendMode {
    /// Let the library choose (general OS).
    #[default]
    Default = 0,
    /// General-purpose OS threads.
    #[cfg_attr(feature = "config-yaml", serde(alias = "unix"))]
    Posix = 1,
    /// Real-time kernel tasks.
    #[cfg_attr(feature = "config-yaml", serde(rename = "rt", alias = "realtime", alias = "rtai"))]
    RealTime = 2,
}

impl BackendMode {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BackendMode::Default => "default",
            BackendMode::Posix => "posix",
            BackendMode::RealTime => "rt",
        }
    }

    /// `true` if this image can serve the mode.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            BackendMode::Default | BackendMode::Posix => true,
            BackendMode::RealTime => cfg!(feature = "rt"),
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for BackendMode {
    type Error = Error;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(BackendMode::Default),
            1 => Ok(BackendMode::Posix),
            2 => Ok(BackendMode::RealTime),
            other => Err(Error::BadArgs(format!("unknown backend mode {}", other))),
        }
    }
}

impl FromStr for BackendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(raw) = s.parse::<i32>() {
            return Self::try_from(raw);
        }
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(BackendMode::Default),
            "posix" | "unix" => Ok(BackendMode::Posix),
            "rt" | "realtime" | "rtai" => Ok(BackendMode::RealTime),
            _ => Err(Error::BadArgs(format!("unknown backend mode '{}'", s))),
        }
    }
}

/// Strategy implementing the dual-environment operations.
///
/// Implementations hold no per-resource state; handles ([`Task`],
/// [`SharedMemory`], [`Fifo`]) carry their own.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Resolved mode served by this backend (never `Default`).
    fn kind(&self) -> BackendMode;

    /// Backend name for logs and errors.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Prepare the process for this backend.
    fn init(&self) -> Result<()>;

    /// Undo [`init`](Self::init).
    fn exit(&self) -> Result<()>;

    /// Launch `spawn` on `task`.
    fn task_start(&self, task: &mut Task, spawn: TaskSpawn) -> Result<()>;

    /// Request cooperative cancellation.
    fn task_stop(&self, task: &Task) -> Result<()> {
        task.control()?.request_stop();
        log::debug!("[TASK] stop requested for task {}", task.id());
        Ok(())
    }

    /// Suspend the task at its next checkpoint.
    fn task_pause(&self, task: &Task) -> Result<()>;

    /// Undo [`task_pause`](Self::task_pause).
    fn task_resume(&self, task: &Task) -> Result<()>;

    /// Change the period of a running task.
    fn task_set_period(&self, task: &Task, period: Option<Duration>) -> Result<()>;

    /// Attach or create a shared memory segment.
    fn shm_new(&self, key: IpcKey, size: usize) -> Result<SharedMemory>;

    /// Base address of `shm` in this process.
    fn shm_addr(&self, shm: &SharedMemory) -> NonNull<u8> {
        shm.addr()
    }

    /// Detach, destroying the segment once unused.
    fn shm_delete(&self, shm: SharedMemory) -> Result<()> {
        shm.delete()
    }

    /// Open (creating if needed) the FIFO at `path`.
    fn fifo_new(&self, path: &Path, key: i32, size: usize) -> Result<Fifo>;

    /// Close and unlink.
    fn fifo_delete(&self, fifo: Fifo) -> Result<()> {
        fifo.delete()
    }

    /// Non-blocking read.
    fn fifo_read(&self, fifo: &Fifo, buf: &mut [u8]) -> Result<usize> {
        fifo.read(buf)
    }

    /// Non-blocking write.
    fn fifo_write(&self, fifo: &Fifo, buf: &[u8]) -> Result<usize> {
        fifo.write(buf)
    }
}

/// Select the backend serving `mode`.
///
/// # Errors
///
/// `Unimplemented` if `mode` is `RealTime` and the `rt` feature is off.
pub fn resolve(mode: BackendMode) -> Result<Box<dyn Backend>> {
    match mode {
        BackendMode::Default | BackendMode::Posix => Ok(Box::new(PosixBackend::new())),
        #[cfg(feature = "rt")]
        BackendMode::RealTime => Ok(Box::new(RtBackend::new())),
        #[cfg(not(feature = "rt"))]
        BackendMode::RealTime => Err(Error::Unimplemented(
            "real-time backend (build with feature `rt`)",
        )),
    }
}
