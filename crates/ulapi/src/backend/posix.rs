// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! General-purpose OS backend.
//!
//! Tasks are ordinary threads. Priorities map onto the thread's nice value
//! (priority 16 is nice 0) and are applied best effort: raising priority
//! usually needs `CAP_SYS_NICE`, and a refusal is logged, not returned.
//! Pause, resume and period changes have no equivalent here and report
//! `Unsupported`.

use super::{Backend, BackendMode};
use crate::error::{Error, Result};
use crate::ipc::{Fifo, IpcKey, SharedMemory};
use crate::task::{Priority, Task, TaskSpawn};
use std::path::Path;
use std::time::Duration;

/// Priority whose nice value is 0.
const NICE_NEUTRAL_PRIORITY: i32 = 16;

/// Threads on a general-purpose scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixBackend;

impl PosixBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn unsupported(operation: &'static str) -> Error {
        Error::Unsupported {
            operation,
            backend: BackendMode::Posix.name(),
        }
    }
}

impl Backend for PosixBackend {
    fn kind(&self) -> BackendMode {
        BackendMode::Posix
    }

    fn init(&self) -> Result<()> {
        log::debug!("[ULAPI] posix backend ready");
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        log::debug!("[ULAPI] posix backend finalized");
        Ok(())
    }

    fn task_start(&self, task: &mut Task, spawn: TaskSpawn) -> Result<()> {
        let priority = spawn.priority();
        task.launch(BackendMode::Posix, spawn, move |_ctx| {
            apply_nice(priority);
            Ok(())
        })
    }

    fn task_pause(&self, task: &Task) -> Result<()> {
        task.control()?;
        Err(Self::unsupported("task_pause"))
    }

    fn task_resume(&self, task: &Task) -> Result<()> {
        task.control()?;
        Err(Self::unsupported("task_resume"))
    }

    fn task_set_period(&self, task: &Task, _period: Option<Duration>) -> Result<()> {
        task.control()?;
        Err(Self::unsupported("task_set_period"))
    }

    fn shm_new(&self, key: IpcKey, size: usize) -> Result<SharedMemory> {
        SharedMemory::attach(key, size)
    }

    fn fifo_new(&self, path: &Path, key: i32, size: usize) -> Result<Fifo> {
        Fifo::create(path, key, size, false)
    }
}

/// Nice value for a ULAPI priority: 1 -> -15, 16 -> 0, 31 -> 15.
fn nice_for(priority: Priority) -> i32 {
    i32::from(priority.get()) - NICE_NEUTRAL_PRIORITY
}

#[cfg(target_os = "linux")]
fn apply_nice(priority: Priority) {
    let nice = nice_for(priority);
    let tid = crate::task::current_task_id() as libc::id_t;
    // SAFETY: setpriority has no pointer arguments; on Linux a thread id
    // with PRIO_PROCESS targets that single thread.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, nice) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if crate::debug::debug_enabled(crate::debug::DEBUG_WARNING) {
            log::warn!("[TASK] could not apply nice {} (priority {}): {}", nice, priority, err);
        } else {
            log::debug!("[TASK] nice {} refused: {}", nice, err);
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_nice(priority: Priority) {
    log::debug!("[TASK] priority {} recorded, not applied on this platform", priority);
}
