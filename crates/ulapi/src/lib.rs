// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ULAPI - portable User-Level API
//!
//! One set of entry points for tasks, synchronization, inter-process
//! channels, sockets and timing, served either by a general-purpose OS
//! backend or by a real-time backend selected when the layer is initialised.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ulapi::{BackendMode, IpcKey, Priority, Semaphore, Task, Ulapi};
//!
//! fn main() -> ulapi::Result<()> {
//!     let ulapi = Ulapi::initialize(BackendMode::Default)?;
//!
//!     // Segment and semaphore shared with other processes by key
//!     let shm = ulapi.shm_new(IpcKey::new(0x4200)?, 4096)?;
//!     let sem = Semaphore::open(IpcKey::new(0x4201)?)?;
//!
//!     sem.take()?;
//!     shm.write_at(0, b"status=ready")?;
//!     sem.give()?;
//!
//!     let mut task = Task::new();
//!     ulapi.task_start(&mut task, Priority::highest(), None, |ctx| {
//!         while ctx.checkpoint() {
//!             // work
//!         }
//!     })?;
//!     ulapi.task_stop(&task)?;
//!     task.join()?;
//!
//!     ulapi.shm_delete(shm)?;
//!     ulapi.finalize()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                     Ulapi context (mode fixed)                      |
//! +-----------------------------------+---------------------------------+
//! |  Backend trait: tasks, shm, FIFO  |  Backend-independent            |
//! |  PosixBackend | RtBackend (rt)    |  Mutex/Cond, Semaphore, Socket, |
//! |                                   |  Descriptor, Library, time      |
//! +-----------------------------------+---------------------------------+
//! |        libc: SysV IPC, mkfifo, sched, dlopen, socket2, mio          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `rt` | compile the real-time backend |
//! | `config-yaml` (default) | [`UlapiConfig::from_yaml_file`] |

/// Execution backends and mode selection.
pub mod backend;
/// Constants and runtime configuration.
pub mod config;
/// The `Ulapi` context object.
pub mod context;
/// Process-wide diagnostic mask.
pub mod debug;
/// Dynamic loader.
pub mod dl;
/// Error taxonomy and result codes.
pub mod error;
/// File-descriptor and serial I/O.
pub mod io;
/// Shared memory and FIFOs.
pub mod ipc;
/// `env_logger` setup helpers.
pub mod logging;
/// Sockets and address helpers.
pub mod net;
/// Argument splitting and shell commands.
pub mod process;
/// Mutex, condition variable, semaphore.
pub mod sync;
/// Tasks and priorities.
pub mod task;
/// Monotonic time and sleeping.
pub mod time;

pub use backend::{Backend, BackendMode};
pub use config::UlapiConfig;
pub use context::Ulapi;
pub use dl::Library;
pub use error::{Error, Result, ResultCode};
pub use io::{Descriptor, Serial, StdStream};
pub use ipc::{Disposition, Fifo, IpcKey, KeyedResource, SharedMemory};
pub use net::{Socket, SocketRole};
pub use sync::{Cond, Mutex, Semaphore};
pub use task::{current_task_id, Priority, Task, TaskContext};
