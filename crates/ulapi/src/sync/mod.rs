// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronization primitives.
//!
//! - [`Mutex`] and [`Cond`] are process-local and must not cross a fork.
//! - [`Semaphore`] is a kernel object named by an [`IpcKey`](crate::ipc::IpcKey)
//!   and shared between processes.
//!
//! None of the blocking calls take a timeout; compose with
//! [`crate::time`] when a bounded wait is needed. No wake-up ordering is
//! guaranteed.

mod cond;
mod mutex;
mod semaphore;

pub use cond::Cond;
pub use mutex::Mutex;
pub use semaphore::Semaphore;
