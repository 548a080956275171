// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-descriptor and serial I/O.

mod fd;
pub mod serial;

pub use fd::{set_fd_nonblocking, Descriptor, StdStream};
pub use serial::Serial;
