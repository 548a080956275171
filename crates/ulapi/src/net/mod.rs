// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IPv4 socket layer.
//!
//! # Modules
//!
//! - `socket` - role-tagged [`Socket`] and its shared read/write/close surface
//! - `tcp` - client, server and accept
//! - `udp` - broadcaster, broadcastee and subnet broadcast
//! - `addr` - host/address conversions

pub mod addr;
mod socket;
mod tcp;
mod udp;

pub use addr::{address_to_hostname, host_address, hostname, hostname_to_address};
pub use socket::{Socket, SocketRole};
