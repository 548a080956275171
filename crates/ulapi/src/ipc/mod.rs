// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-process data exchange: keyed shared memory and named FIFOs.

mod fifo;
mod key;
mod shm;

pub use fifo::Fifo;
pub use key::{Disposition, IpcKey, KeyedResource};
pub use shm::SharedMemory;
