// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ULAPI configuration - constants and runtime settings.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (priorities, socket options, IPC permissions)
//! - **Level 2 (Dynamic)**: [`UlapiConfig`], built from defaults, environment or YAML
//!
//! # Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `ULAPI_BACKEND` | `default`, `posix`/`unix`, `rt`/`realtime`/`rtai`, or `0`/`1`/`2` |
//! | `ULAPI_DEBUG` | diagnostic mask, decimal or `0x` hex |
//! | `ULAPI_WAIT_OFFSET_NS` | nanoseconds subtracted from every `wait` |
//! | `ULAPI_FIFO_DIR` | directory holding named FIFOs |
//!
//! # Example YAML
//!
//! ```yaml
//! mode: posix
//! debug_mask: 0x1
//! wait_offset_ns: 1000
//! fifo_dir: /run/ulapi
//! ```

use crate::backend::BackendMode;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =======================================================================
// Task priorities
// =======================================================================

/// Highest task priority (lower value = more urgent).
pub const PRIO_HIGHEST: u8 = 1;

/// Lowest task priority.
pub const PRIO_LOWEST: u8 = 31;

// =======================================================================
// Sockets
// =======================================================================

/// Pending connection queue for server sockets.
pub const LISTEN_BACKLOG: i32 = 5;

/// Linger applied to server sockets so buffered output drains on close.
pub const SERVER_LINGER: Duration = Duration::from_secs(30);

/// 127.0.0.1 as a host-order integer, used when hostname resolution fails.
pub const LOOPBACK_ADDRESS: u32 = (127 << 24) | 1;

/// Maximum hostname length read from the system.
pub const HOSTNAME_MAX: usize = 256;

// =======================================================================
// IPC
// =======================================================================

/// Permission bits for System V semaphores.
pub const SEM_PERMISSIONS: i32 = 0o664;

/// Permission bits for System V shared memory segments.
pub const SHM_PERMISSIONS: i32 = 0o666;

/// Permission bits for named FIFOs.
pub const FIFO_PERMISSIONS: u32 = 0o666;

/// File name prefix of named FIFOs (`<dir>/ulapi_fifo_<key>`).
pub const FIFO_PREFIX: &str = "ulapi_fifo_";

/// Default FIFO directory.
pub const DEFAULT_FIFO_DIR: &str = "/tmp";

// =======================================================================
// Timing
// =======================================================================

/// Nanoseconds subtracted from each `wait` to absorb call overhead.
pub const DEFAULT_WAIT_OFFSET_NS: u64 = 1;

/// Runtime configuration of a ULAPI context.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-yaml", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-yaml", serde(default))]
pub struct UlapiConfig {
    /// Requested backend.
    pub mode: BackendMode,
    /// Diagnostic mask applied when the context is created.
    pub debug_mask: u32,
    /// Offset subtracted from every periodic wait.
    pub wait_offset_ns: u64,
    /// Directory holding named FIFOs.
    pub fifo_dir: PathBuf,
}

impl Default for UlapiConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Default,
            debug_mask: 0,
            wait_offset_ns: DEFAULT_WAIT_OFFSET_NS,
            fifo_dir: PathBuf::from(DEFAULT_FIFO_DIR),
        }
    }
}

impl UlapiConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend mode.
    #[must_use]
    pub fn mode(mut self, mode: BackendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the diagnostic mask.
    #[must_use]
    pub fn debug_mask(mut self, mask: u32) -> Self {
        self.debug_mask = mask;
        self
    }

    /// Set the periodic wait offset.
    #[must_use]
    pub fn wait_offset_ns(mut self, offset: u64) -> Self {
        self.wait_offset_ns = offset;
        self
    }

    /// Set the FIFO directory.
    #[must_use]
    pub fn fifo_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fifo_dir = dir.into();
        self
    }

    /// Defaults overridden by `ULAPI_*` environment variables.
    ///
    /// # Errors
    ///
    /// `BadArgs` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// As [`from_env`](Self::from_env), with `mode` taking precedence.
    ///
    /// `ULAPI_BACKEND` is consulted only when `mode` is
    /// [`BackendMode::Default`]; otherwise it is not parsed at all.
    ///
    /// # Errors
    ///
    /// `BadArgs` if a consulted variable cannot be parsed.
    pub fn from_env_with_mode(mode: BackendMode) -> Result<Self> {
        Self::from_lookup_with_mode(|name| std::env::var(name).ok(), mode)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_mode(lookup, BackendMode::Default)
    }

    fn from_lookup_with_mode<F>(lookup: F, mode: BackendMode) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default().mode(mode);

        if mode == BackendMode::Default {
            if let Some(text) = lookup("ULAPI_BACKEND") {
                config.mode = text.parse()?;
            }
        } else if let Some(text) = lookup("ULAPI_BACKEND") {
            log::debug!("[ULAPI] ULAPI_BACKEND={} ignored, {} requested", text, mode);
        }
        if let Some(mask) = lookup("ULAPI_DEBUG") {
            config.debug_mask = parse_mask(&mask)?;
        }
        if let Some(offset) = lookup("ULAPI_WAIT_OFFSET_NS") {
            config.wait_offset_ns = offset.trim().parse().map_err(|_| {
                Error::BadArgs(format!("ULAPI_WAIT_OFFSET_NS is not a number: {offset}"))
            })?;
        }
        if let Some(dir) = lookup("ULAPI_FIFO_DIR") {
            if dir.is_empty() {
                return Err(Error::BadArgs("ULAPI_FIFO_DIR is empty".into()));
            }
            config.fifo_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Parse a YAML document.
    #[cfg(feature = "config-yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::BadArgs(format!("invalid YAML config: {e}")))
    }

    /// Load a YAML file.
    #[cfg(feature = "config-yaml")]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        log::debug!("[ULAPI] loaded config from {}", path.display());
        Self::from_yaml_str(&text)
    }

    /// Full path of the FIFO for `key`.
    #[must_use]
    pub fn fifo_path(&self, key: i32) -> PathBuf {
        fifo_path_in(&self.fifo_dir, key)
    }
}

/// `<dir>/ulapi_fifo_<key>`.
#[must_use]
pub fn fifo_path_in(dir: &Path, key: i32) -> PathBuf {
    dir.join(format!("{FIFO_PREFIX}{key}"))
}

fn parse_mask(text: &str) -> Result<u32> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| Error::BadArgs(format!("invalid debug mask: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = UlapiConfig::default();
        assert_eq!(config.mode, BackendMode::Default);
        assert_eq!(config.debug_mask, 0);
        assert_eq!(config.wait_offset_ns, DEFAULT_WAIT_OFFSET_NS);
        assert_eq!(config.fifo_path(7), PathBuf::from("/tmp/ulapi_fifo_7"));
    }

    #[test]
    fn test_env_overrides() {
        let config = UlapiConfig::from_lookup(lookup_from(&[
            ("ULAPI_BACKEND", "unix"),
            ("ULAPI_DEBUG", "0x3"),
            ("ULAPI_WAIT_OFFSET_NS", "250"),
            ("ULAPI_FIFO_DIR", "/run/ulapi"),
        ]))
        .expect("valid env");

        assert_eq!(config.mode, BackendMode::Posix);
        assert_eq!(config.debug_mask, 3);
        assert_eq!(config.wait_offset_ns, 250);
        assert_eq!(config.fifo_dir, PathBuf::from("/run/ulapi"));
    }

    #[test]
    fn test_env_bad_values() {
        let bad_mode = UlapiConfig::from_lookup(lookup_from(&[("ULAPI_BACKEND", "vxworks")]));
        assert!(matches!(bad_mode, Err(Error::BadArgs(_))));

        let bad_mask = UlapiConfig::from_lookup(lookup_from(&[("ULAPI_DEBUG", "lots")]));
        assert!(matches!(bad_mask, Err(Error::BadArgs(_))));
    }

    #[test]
    fn test_explicit_mode_ignores_backend_variable() {
        let config = UlapiConfig::from_lookup_with_mode(
            lookup_from(&[("ULAPI_BACKEND", "vxworks"), ("ULAPI_DEBUG", "2")]),
            BackendMode::Posix,
        )
        .expect("explicit mode");
        assert_eq!(config.mode, BackendMode::Posix);
        assert_eq!(config.debug_mask, 2);

        let from_var = UlapiConfig::from_lookup_with_mode(
            lookup_from(&[("ULAPI_BACKEND", "posix")]),
            BackendMode::Default,
        )
        .expect("default mode");
        assert_eq!(from_var.mode, BackendMode::Posix);

        let still_bad = UlapiConfig::from_lookup_with_mode(
            lookup_from(&[("ULAPI_BACKEND", "vxworks")]),
            BackendMode::Default,
        );
        assert!(matches!(still_bad, Err(Error::BadArgs(_))));
    }

    #[test]
    fn test_builder() {
        let config = UlapiConfig::new()
            .mode(BackendMode::Posix)
            .debug_mask(1)
            .wait_offset_ns(10)
            .fifo_dir("/var/tmp");
        assert_eq!(config.mode, BackendMode::Posix);
        assert_eq!(config.fifo_path(-3), PathBuf::from("/var/tmp/ulapi_fifo_-3"));
    }

    #[cfg(feature = "config-yaml")]
    #[test]
    fn test_yaml() {
        let config = UlapiConfig::from_yaml_str(
            "mode: rtai\ndebug_mask: 5\nfifo_dir: /dev/shm\n",
        )
        .expect("valid yaml");
        assert_eq!(config.mode, BackendMode::RealTime);
        assert_eq!(config.debug_mask, 5);
        assert_eq!(config.wait_offset_ns, DEFAULT_WAIT_OFFSET_NS);
        assert_eq!(config.fifo_dir, PathBuf::from("/dev/shm"));

        assert!(UlapiConfig::from_yaml_str("mode: [1, 2]").is_err());
    }

    #[cfg(feature = "config-yaml")]
    #[test]
    fn test_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "mode: posix").expect("write");
        writeln!(file, "wait_offset_ns: 42").expect("write");

        let config = UlapiConfig::from_yaml_file(file.path()).expect("load");
        assert_eq!(config.mode, BackendMode::Posix);
        assert_eq!(config.wait_offset_ns, 42);
    }
}
