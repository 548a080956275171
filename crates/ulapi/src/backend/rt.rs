// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Real-time backend for PREEMPT_RT style kernels.
//!
//! - `init` locks current and future pages (`mlockall`)
//! - tasks run under `SCHED_FIFO`; ULAPI priority 1 is the top FIFO level
//! - periods are absolute deadlines (see `TaskContext::wait_period`)
//! - pause, resume and period changes take effect at task checkpoints
//! - shared memory segments are page-locked, FIFOs must get their full capacity
//!
//! Failing to obtain real-time scheduling is an error, never a silent
//! downgrade.

use super::{Backend, BackendMode};
use crate::debug::diag;
use crate::error::{Error, Result};
use crate::ipc::{Fifo, IpcKey, SharedMemory};
use crate::task::{Priority, Task, TaskSpawn};
use std::io;
use std::path::Path;
use std::time::Duration;

/// `SCHED_FIFO` threads with locked memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct RtBackend;

impl RtBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Backend for RtBackend {
    fn kind(&self) -> BackendMode {
        BackendMode::RealTime
    }

    fn init(&self) -> Result<()> {
        // SAFETY: mlockall has no pointer arguments.
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc < 0 {
            let e = Error::last_os_error();
            diag!("mlockall", e);
            return Err(e);
        }
        log::debug!("[ULAPI] rt backend ready (memory locked)");
        Ok(())
    }

    fn exit(&self) -> Result<()> {
        // SAFETY: munlockall has no arguments.
        let rc = unsafe { libc::munlockall() };
        if rc < 0 {
            let e = Error::last_os_error();
            diag!("munlockall", e);
            return Err(e);
        }
        log::debug!("[ULAPI] rt backend finalized");
        Ok(())
    }

    fn task_start(&self, task: &mut Task, spawn: TaskSpawn) -> Result<()> {
        let priority = spawn.priority();
        task.launch(BackendMode::RealTime, spawn, move |_ctx| {
            set_fifo_scheduling(priority)
        })
    }

    fn task_pause(&self, task: &Task) -> Result<()> {
        task.control()?.set_paused(true);
        log::debug!("[TASK] paused task {}", task.id());
        Ok(())
    }

    fn task_resume(&self, task: &Task) -> Result<()> {
        task.control()?.set_paused(false);
        log::debug!("[TASK] resumed task {}", task.id());
        Ok(())
    }

    fn task_set_period(&self, task: &Task, period: Option<Duration>) -> Result<()> {
        task.control()?.set_period(period.filter(|p| !p.is_zero()));
        log::debug!("[TASK] task {} period -> {:?}", task.id(), period);
        Ok(())
    }

    fn shm_new(&self, key: IpcKey, size: usize) -> Result<SharedMemory> {
        let mut shm = SharedMemory::attach(key, size)?;
        shm.lock_pages()?;
        Ok(shm)
    }

    fn fifo_new(&self, path: &Path, key: i32, size: usize) -> Result<Fifo> {
        Fifo::create(path, key, size, true)
    }
}

/// `SCHED_FIFO` level for a ULAPI priority, top level first.
fn fifo_level(priority: Priority, min: i32, max: i32) -> i32 {
    (max - (i32::from(priority.get()) - 1)).max(min)
}

fn set_fifo_scheduling(priority: Priority) -> Result<()> {
    // SAFETY: no pointer arguments.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    if min < 0 || max < 0 {
        return Err(Error::last_os_error());
    }

    // SAFETY: sched_param is plain old data; all-zero is valid.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = fifo_level(priority, min, max);

    // SAFETY:
    // - pthread_self() is the calling thread, alive for the duration of the call
    // - param is a valid sched_param on the stack
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc != 0 {
        let err = io::Error::from_raw_os_error(rc);
        diag!("pthread_setschedparam(SCHED_FIFO)", err);
        return Err(Error::Io(err));
    }
    log::debug!(
        "[TASK] SCHED_FIFO level {} for priority {}",
        param.sched_priority,
        priority
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_level_mapping() {
        assert_eq!(fifo_level(Priority::highest(), 1, 99), 99);
        assert_eq!(fifo_level(Priority::new(2).expect("valid"), 1, 99), 98);
        assert_eq!(fifo_level(Priority::lowest(), 1, 99), 69);
        assert_eq!(fifo_level(Priority::lowest(), 1, 20), 1);
    }

    #[test]
    #[ignore = "needs CAP_SYS_NICE and CAP_IPC_LOCK"]
    fn test_rt_task_runs_under_fifo() {
        let backend = RtBackend::new();
        backend.init().expect("mlockall");

        let mut task = Task::new();
        backend
            .task_start(
                &mut task,
                TaskSpawn::new(Priority::highest(), Some(Duration::from_millis(1)), 0, |ctx| {
                    let mut n = 0;
                    while ctx.wait_period() && n < 10 {
                        n += 1;
                    }
                }),
            )
            .expect("start");
        task.join().expect("join");
        backend.exit().expect("munlockall");
    }

    #[test]
    fn test_pause_resume_honoured() {
        let backend = RtBackend::new();
        let mut task = Task::new();
        // Control flow only: launch directly so no scheduling privilege is needed.
        task.launch(
            BackendMode::RealTime,
            TaskSpawn::new(Priority::lowest(), None, 0, |ctx| {
                while ctx.checkpoint() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }),
            |_| Ok(()),
        )
        .expect("launch");
        backend.task_pause(&task).expect("pause");
        backend.task_resume(&task).expect("resume");
        backend
            .task_set_period(&task, Some(Duration::from_millis(2)))
            .expect("set period");
        assert_eq!(task.period(), Some(Duration::from_millis(2)));
        backend.task_stop(&task).expect("stop");
        task.join().expect("join");
    }
}
