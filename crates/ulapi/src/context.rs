// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The ULAPI context: one resolved backend plus its configuration.
//!
//! A context replaces process-wide mode state. Its mode is fixed at
//! creation, and every backend-dependent call goes through it.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use ulapi::{BackendMode, Priority, Task, Ulapi};
//!
//! let ulapi = Ulapi::initialize(BackendMode::Default)?;
//! let mut task = Task::new();
//! ulapi.task_start(&mut task, Priority::lowest(), Some(Duration::from_millis(10)), |ctx| {
//!     while ctx.wait_period() {
//!         // periodic work
//!     }
//! })?;
//! ulapi.task_stop(&task)?;
//! task.join()?;
//! ulapi.finalize()?;
//! # Ok::<(), ulapi::Error>(())
//! ```

use crate::backend::{self, Backend, BackendMode};
use crate::config::UlapiConfig;
use crate::error::Result;
use crate::ipc::{Fifo, IpcKey, SharedMemory};
use crate::task::{Priority, Task, TaskContext, TaskSpawn};
use crate::{debug, time};
use std::fmt;
use std::ptr::NonNull;
use std::time::Duration;

/// Initialised ULAPI layer.
pub struct Ulapi {
    mode: BackendMode,
    backend: Box<dyn Backend>,
    config: UlapiConfig,
    finalized: bool,
}

impl Ulapi {
    /// Initialise with default settings and the requested `mode`.
    ///
    /// # Errors
    ///
    /// - `Unimplemented` for `RealTime` when the backend is not compiled in
    /// - whatever the backend's own initialiser reports
    pub fn initialize(mode: BackendMode) -> Result<Self> {
        Self::with_config(UlapiConfig::default().mode(mode))
    }

    /// Initialise from a full configuration.
    ///
    /// A non-zero `debug_mask` replaces the process-wide diagnostic mask.
    pub fn with_config(config: UlapiConfig) -> Result<Self> {
        if config.debug_mask != 0 {
            debug::set_debug(config.debug_mask);
        }
        let backend = backend::resolve(config.mode)?;
        backend.init()?;
        let mode = backend.kind();
        log::info!(
            "[ULAPI] initialized (requested={}, backend={})",
            config.mode,
            backend.name()
        );
        Ok(Self {
            mode,
            backend,
            config,
            finalized: false,
        })
    }

    /// Initialise from `ULAPI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(UlapiConfig::from_env()?)
    }

    /// Tear the backend down.
    pub fn finalize(mut self) -> Result<()> {
        self.finalized = true;
        self.backend.exit()?;
        log::info!("[ULAPI] finalized ({})", self.mode);
        Ok(())
    }

    /// Resolved backend mode (`Posix` or `RealTime`, never `Default`).
    #[must_use]
    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Active backend.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Configuration the context was created with.
    #[must_use]
    pub fn config(&self) -> &UlapiConfig {
        &self.config
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Start `task` running `entry` at `priority`.
    ///
    /// `period` is a hint on the general-OS backend and enforced by
    /// [`TaskContext::wait_period`] on the real-time backend.
    pub fn task_start<F>(
        &self,
        task: &mut Task,
        priority: Priority,
        period: Option<Duration>,
        entry: F,
    ) -> Result<()>
    where
        F: FnOnce(TaskContext) + Send + 'static,
    {
        let spawn = TaskSpawn::new(priority, period, self.config.wait_offset_ns, entry);
        self.backend.task_start(task, spawn)
    }

    /// Request cooperative cancellation.
    pub fn task_stop(&self, task: &Task) -> Result<()> {
        self.backend.task_stop(task)
    }

    /// Suspend at the next checkpoint (real-time backend).
    pub fn task_pause(&self, task: &Task) -> Result<()> {
        self.backend.task_pause(task)
    }

    /// Resume a paused task (real-time backend).
    pub fn task_resume(&self, task: &Task) -> Result<()> {
        self.backend.task_resume(task)
    }

    /// Change a running task's period (real-time backend).
    pub fn task_set_period(&self, task: &Task, period: Option<Duration>) -> Result<()> {
        self.backend.task_set_period(task, period)
    }

    /// Sleep one period less the configured wait offset.
    pub fn wait(&self, period: Duration) {
        time::wait_with_offset(period, self.config.wait_offset_ns);
    }

    // ========================================================================
    // Shared memory
    // ========================================================================

    /// Attach to or create the segment named `key`.
    pub fn shm_new(&self, key: IpcKey, size: usize) -> Result<SharedMemory> {
        self.backend.shm_new(key, size)
    }

    /// Base address of `shm` in this process.
    #[must_use]
    pub fn shm_addr(&self, shm: &SharedMemory) -> NonNull<u8> {
        self.backend.shm_addr(shm)
    }

    /// Detach; destroy once no process is attached.
    pub fn shm_delete(&self, shm: SharedMemory) -> Result<()> {
        self.backend.shm_delete(shm)
    }

    // ========================================================================
    // FIFOs
    // ========================================================================

    /// Open (creating if needed) the FIFO for `key` in the configured directory.
    pub fn fifo_new(&self, key: i32, size: usize) -> Result<Fifo> {
        self.backend.fifo_new(&self.config.fifo_path(key), key, size)
    }

    /// Close and unlink.
    pub fn fifo_delete(&self, fifo: Fifo) -> Result<()> {
        self.backend.fifo_delete(fifo)
    }

    /// Non-blocking read; returns the bytes moved.
    pub fn fifo_read(&self, fifo: &Fifo, buf: &mut [u8]) -> Result<usize> {
        self.backend.fifo_read(fifo, buf)
    }

    /// Non-blocking write; returns the bytes moved.
    pub fn fifo_write(&self, fifo: &Fifo, buf: &[u8]) -> Result<usize> {
        self.backend.fifo_write(fifo, buf)
    }
}

impl fmt::Debug for Ulapi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ulapi")
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Drop for Ulapi {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.backend.exit() {
                log::debug!("[ULAPI] backend exit on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_resolves_to_posix() {
        let ulapi = Ulapi::initialize(BackendMode::Default).expect("init");
        assert_eq!(ulapi.mode(), BackendMode::Posix);
        assert_eq!(ulapi.backend().name(), "posix");
        ulapi.finalize().expect("finalize");
    }

    #[test]
    fn test_init_finalize_repeatable() {
        for _ in 0..3 {
            Ulapi::initialize(BackendMode::Posix)
                .expect("init")
                .finalize()
                .expect("finalize");
        }
    }

    #[cfg(not(feature = "rt"))]
    #[test]
    fn test_rt_unimplemented() {
        assert!(matches!(
            Ulapi::initialize(BackendMode::RealTime),
            Err(Error::Unimplemented(_))
        ));
    }

    #[test]
    fn test_posix_pause_unsupported() {
        let ulapi = Ulapi::initialize(BackendMode::Posix).expect("init");
        let mut task = Task::new();
        ulapi
            .task_start(&mut task, Priority::lowest(), None, |ctx| {
                while ctx.checkpoint() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
            .expect("start");

        let err = ulapi.task_pause(&task).expect_err("pause");
        assert_eq!(err.code(), crate::ResultCode::ImplError);

        ulapi.task_stop(&task).expect("stop");
        task.join().expect("join");
    }

    #[test]
    fn test_fifo_uses_configured_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ulapi =
            Ulapi::with_config(UlapiConfig::new().fifo_dir(dir.path())).expect("init");

        let fifo = ulapi.fifo_new(55, 4096).expect("fifo");
        assert_eq!(fifo.path(), dir.path().join("ulapi_fifo_55"));
        assert_eq!(ulapi.fifo_write(&fifo, b"ping").expect("write"), 4);
        let mut buf = [0u8; 4];
        assert_eq!(ulapi.fifo_read(&fifo, &mut buf).expect("read"), 4);
        assert_eq!(&buf, b"ping");
        ulapi.fifo_delete(fifo).expect("delete");
    }
}
