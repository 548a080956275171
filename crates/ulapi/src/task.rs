// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Task control: schedulable units of execution.
//!
//! A [`Task`] is an owned handle. It becomes live when a backend starts it
//! (see [`crate::Ulapi::task_start`]) and the entry closure receives a
//! [`TaskContext`] through which it observes stop, pause and period requests.
//!
//! # Cancellation
//!
//! Stopping is cooperative: `task_stop` raises a flag and the entry returns
//! when it next calls [`TaskContext::should_stop`], [`TaskContext::checkpoint`]
//! or [`TaskContext::wait_period`]. A task is never torn down while it holds
//! a lock.
//!
//! # Lifecycle
//!
//! ```text
//! Task::new() -> task_start() -> [task_stop()] -> join() -> delete()
//! ```

use crate::backend::BackendMode;
use crate::config::{PRIO_HIGHEST, PRIO_LOWEST};
use crate::error::{Error, Result};
use crate::time;
use crossbeam::channel;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<TaskContext>> = const { RefCell::new(None) };
}

// ============================================================================
// Priority
// ============================================================================

/// Task priority. Lower numeric value = higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Most urgent priority (1).
    #[must_use]
    pub const fn highest() -> Self {
        Self(PRIO_HIGHEST)
    }

    /// Least urgent priority (31).
    #[must_use]
    pub const fn lowest() -> Self {
        Self(PRIO_LOWEST)
    }

    /// Validate a raw priority.
    ///
    /// # Errors
    ///
    /// `BadArgs` outside `1..=31`.
    pub fn new(value: u8) -> Result<Self> {
        if (PRIO_HIGHEST..=PRIO_LOWEST).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::BadArgs(format!(
                "priority {value} outside {PRIO_HIGHEST}..={PRIO_LOWEST}"
            )))
        }
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// One step more urgent, clamped at [`Priority::highest`].
    #[must_use]
    pub const fn next_higher(self) -> Self {
        if self.0 <= PRIO_HIGHEST {
            self
        } else {
            Self(self.0 - 1)
        }
    }

    /// One step less urgent, clamped at [`Priority::lowest`].
    #[must_use]
    pub const fn next_lower(self) -> Self {
        if self.0 >= PRIO_LOWEST {
            self
        } else {
            Self(self.0 + 1)
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::lowest()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Shared task state
// ============================================================================

pub(crate) struct TaskControl {
    id: u64,
    mode: BackendMode,
    priority: AtomicU8,
    /// 0 = no period
    period_ns: AtomicU64,
    wait_offset_ns: u64,
    stop: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
    /// Absolute release time of the next period (real-time backend only).
    next_release: Mutex<Option<Duration>>,
}

impl TaskControl {
    fn new(id: u64, mode: BackendMode, spawn: &TaskSpawn) -> Self {
        Self {
            id,
            mode,
            priority: AtomicU8::new(spawn.priority.get()),
            period_ns: AtomicU64::new(duration_to_ns(spawn.period)),
            wait_offset_ns: spawn.wait_offset_ns,
            stop: AtomicBool::new(false),
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            next_release: Mutex::new(None),
        }
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        // Wake a paused task so it can observe the stop.
        let _guard = self.paused.lock();
        self.resumed.notify_all();
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        let mut state = self.paused.lock();
        *state = paused;
        if !paused {
            self.resumed.notify_all();
        }
    }

    pub(crate) fn set_period(&self, period: Option<Duration>) {
        self.period_ns
            .store(duration_to_ns(period), Ordering::Release);
        *self.next_release.lock() = None;
    }

    fn period(&self) -> Option<Duration> {
        match self.period_ns.load(Ordering::Acquire) {
            0 => None,
            ns => Some(Duration::from_nanos(ns)),
        }
    }
}

fn duration_to_ns(period: Option<Duration>) -> u64 {
    period.map_or(0, |p| p.as_nanos().min(u128::from(u64::MAX)) as u64)
}

// ============================================================================
// TaskContext
// ============================================================================

/// View of the running task handed to its entry point.
#[derive(Clone)]
pub struct TaskContext {
    control: Arc<TaskControl>,
}

impl TaskContext {
    /// Context of the task running on the calling thread, if any.
    #[must_use]
    pub fn current() -> Option<TaskContext> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Handle id of this task.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.control.id
    }

    /// Backend the task was started on.
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        self.control.mode
    }

    /// Priority recorded at start.
    #[must_use]
    pub fn priority(&self) -> Priority {
        Priority(self.control.priority.load(Ordering::Relaxed))
    }

    /// Period hint (general-OS backend) or enforced period (real-time backend).
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.control.period()
    }

    /// `true` once a stop has been requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.control.stop.load(Ordering::Acquire)
    }

    /// Block while the task is paused.
    ///
    /// Returns `false` if the task should stop.
    pub fn checkpoint(&self) -> bool {
        let mut paused = self.control.paused.lock();
        while *paused && !self.should_stop() {
            self.control.resumed.wait(&mut paused);
        }
        !self.should_stop()
    }

    /// Sleep until the next period, then run a [`checkpoint`](Self::checkpoint).
    ///
    /// On the general-OS backend this is a relative sleep of one period; on
    /// the real-time backend releases are spaced on absolute deadlines so
    /// execution time does not accumulate drift.
    pub fn wait_period(&self) -> bool {
        if let Some(period) = self.period() {
            match self.control.mode {
                BackendMode::RealTime => self.wait_absolute(period),
                BackendMode::Default | BackendMode::Posix => {
                    time::wait_with_offset(period, self.control.wait_offset_ns);
                }
            }
        }
        self.checkpoint()
    }

    fn wait_absolute(&self, period: Duration) {
        let deadline = {
            let mut next = self.control.next_release.lock();
            let now = time::now();
            let release = next.map_or(now + period, |n| n + period);
            // Overrun by more than a full period: re-anchor instead of bursting.
            let release = if release + period < now {
                log::debug!("[TASK] task {} overran its period, re-anchoring", self.id());
                now + period
            } else {
                release
            };
            *next = Some(release);
            release
        };
        time::sleep_until(deadline);
    }

    /// Change the period of the calling task (real-time backend only).
    ///
    /// # Errors
    ///
    /// `Unsupported` on the general-OS backend.
    pub fn set_period(&self, period: Option<Duration>) -> Result<()> {
        match self.control.mode {
            BackendMode::RealTime => {
                self.control.set_period(period);
                Ok(())
            }
            BackendMode::Default | BackendMode::Posix => Err(Error::Unsupported {
                operation: "self_set_period",
                backend: self.control.mode.name(),
            }),
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("id", &self.control.id)
            .field("mode", &self.control.mode)
            .field("priority", &self.priority())
            .field("period", &self.period())
            .finish()
    }
}

// ============================================================================
// TaskSpawn
// ============================================================================

type Entry = Box<dyn FnOnce(TaskContext) + Send + 'static>;

/// Start request handed to a backend.
pub struct TaskSpawn {
    priority: Priority,
    period: Option<Duration>,
    wait_offset_ns: u64,
    entry: Entry,
}

impl TaskSpawn {
    pub(crate) fn new<F>(
        priority: Priority,
        period: Option<Duration>,
        wait_offset_ns: u64,
        entry: F,
    ) -> Self
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        Self {
            priority,
            period: period.filter(|p| !p.is_zero()),
            wait_offset_ns,
            entry: Box::new(entry),
        }
    }

    /// Requested priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Requested period.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

impl fmt::Debug for TaskSpawn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpawn")
            .field("priority", &self.priority)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Task
// ============================================================================

/// Owned handle to one schedulable unit.
pub struct Task {
    id: u64,
    control: Option<Arc<TaskControl>>,
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Allocate an unstarted handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            control: None,
            handle: None,
        }
    }

    /// Handle id (unique within the process).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `true` once the task has been started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.control.is_some()
    }

    /// `true` once the entry point has returned (or the task was joined).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Priority recorded at start.
    #[must_use]
    pub fn priority(&self) -> Option<Priority> {
        self.control
            .as_ref()
            .map(|c| Priority(c.priority.load(Ordering::Relaxed)))
    }

    /// Period recorded at start or by `set_period`.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.control.as_ref().and_then(|c| c.period())
    }

    pub(crate) fn control(&self) -> Result<&Arc<TaskControl>> {
        self.control
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("task {} has not been started", self.id)))
    }

    /// Spawn the OS thread backing this handle.
    ///
    /// `setup` runs on the new thread before the entry point (this is where
    /// backends apply scheduling policy). If it fails the entry never runs and
    /// the error is returned here.
    pub fn launch<S>(&mut self, mode: BackendMode, spawn: TaskSpawn, setup: S) -> Result<()>
    where
        S: FnOnce(&TaskContext) -> Result<()> + Send + 'static,
    {
        if self.control.is_some() {
            return Err(Error::InvalidState(format!(
                "task {} already started",
                self.id
            )));
        }

        let control = Arc::new(TaskControl::new(self.id, mode, &spawn));
        let ctx = TaskContext {
            control: Arc::clone(&control),
        };
        let (ready_tx, ready_rx) = channel::bounded::<Result<()>>(1);
        let entry = spawn.entry;

        let handle = std::thread::Builder::new()
            .name(format!("ulapi-task-{}", self.id))
            .spawn(move || {
                if let Err(e) = setup(&ctx) {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                CURRENT.with(|slot| *slot.borrow_mut() = Some(ctx.clone()));
                entry(ctx);
                CURRENT.with(|slot| *slot.borrow_mut() = None);
            })
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::OutOfMemory {
                    Error::OutOfMemory
                } else {
                    Error::Io(e)
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                // Setup panicked before reporting.
                let _ = handle.join();
                return Err(Error::TaskPanicked);
            }
        }

        log::debug!(
            "[TASK] started task {} on {} backend (priority={}, period={:?})",
            self.id,
            mode.name(),
            spawn.priority,
            spawn.period
        );
        self.control = Some(control);
        self.handle = Some(handle);
        Ok(())
    }

    /// Block until the entry point returns.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the task was never started or was already joined,
    /// `TaskPanicked` if the entry point panicked.
    pub fn join(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or_else(|| {
            Error::InvalidState(format!("task {} is not joinable", self.id))
        })?;
        handle.join().map_err(|_| Error::TaskPanicked)?;
        log::debug!("[TASK] joined task {}", self.id);
        Ok(())
    }

    /// Release the handle.
    ///
    /// # Errors
    ///
    /// `InvalidState` while the entry point is still running; stop and join
    /// the task first.
    pub fn delete(mut self) -> Result<()> {
        if !self.is_finished() {
            return Err(Error::InvalidState(format!(
                "task {} is still running",
                self.id
            )));
        }
        // Reap a finished-but-unjoined thread.
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| Error::TaskPanicked)?;
        }
        Ok(())
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("started", &self.is_started())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let (Some(control), Some(handle)) = (&self.control, &self.handle) {
            if !handle.is_finished() {
                log::debug!(
                    "[TASK] handle {} dropped while running, requesting stop and detaching",
                    self.id
                );
                control.request_stop();
            }
        }
    }
}

/// OS identifier of the calling thread.
#[must_use]
pub fn current_task_id() -> u64 {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: gettid takes no arguments and cannot fail.
        unsafe { libc::syscall(libc::SYS_gettid) as u64 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        // SAFETY: pthread_self is always safe to call.
        unsafe { libc::pthread_self() as u64 }
    }
}
