// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial ports.
//!
//! A serial port is driven exactly like any other descriptor; line settings
//! (baud rate, parity) are left to the caller.

use super::Descriptor;
use crate::error::Result;
use std::path::Path;

/// Serial port handle.
pub type Serial = Descriptor;

/// Open the serial device at `path` (e.g. `/dev/ttyUSB0`) read-write.
pub fn open(path: impl AsRef<Path>) -> Result<Serial> {
    let mut serial = Serial::new();
    serial.open(path)?;
    log::debug!("[IO] serial port open fd={}", std::os::unix::io::AsRawFd::as_raw_fd(&serial));
    Ok(serial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_behaves_like_descriptor() {
        // A regular file stands in for the device node.
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let mut serial = open(file.path()).expect("open");
        assert!(serial.is_open());
        serial.set_nonblocking().expect("nonblocking");
        assert_eq!(serial.write(b"AT\r").expect("write"), 3);
        serial.close().expect("close");
        assert_eq!(std::fs::read(file.path()).expect("read back"), b"AT\r");
    }

    #[test]
    fn test_open_missing_device() {
        assert!(open("/dev/ulapi-no-such-tty").is_err());
    }
}
