// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Console logger installation.
//!
//! ULAPI itself only talks to the `log` facade. Applications that have no
//! logger of their own can install `env_logger` through these helpers.
//!
//! A debug mask maps onto a level: `DEBUG_INFO` lifecycle events are logged
//! at `debug`, `DEBUG_ERROR`/`DEBUG_WARNING` diagnostics at `warn`.

use crate::debug::{set_debug, DEBUG_ERROR, DEBUG_INFO, DEBUG_WARNING};
use crate::error::{Error, Result};
use log::LevelFilter;

/// Most verbose level any category in `mask` logs at.
#[must_use]
pub fn level_for_mask(mask: u32) -> LevelFilter {
    if mask & DEBUG_INFO != 0 {
        LevelFilter::Debug
    } else if mask & (DEBUG_ERROR | DEBUG_WARNING) != 0 {
        LevelFilter::Warn
    } else {
        LevelFilter::Error
    }
}

/// Set the debug mask and install a console logger that shows it.
///
/// The mask is applied even when another logger is already installed.
///
/// # Errors
///
/// `InvalidState` if a logger is already installed.
pub fn init_for_mask(mask: u32) -> Result<()> {
    set_debug(mask);
    init(level_for_mask(mask))
}

/// Install a console logger at `level`.
///
/// # Errors
///
/// `InvalidState` if a logger is already installed.
pub fn init(level: LevelFilter) -> Result<()> {
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
        .map_err(|_| Error::InvalidState("logger already initialized".into()))
}

/// Install a console logger honouring `RUST_LOG`, defaulting to `default_level`.
pub fn init_from_env(default_level: LevelFilter) -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
    .map_err(|_| Error::InvalidState("logger already initialized".into()))
}

/// Install a console logger with an explicit filter (e.g. `"ulapi=debug,info"`).
pub fn init_with_filter(filter: &str) -> Result<()> {
    if filter.trim().is_empty() {
        return Err(Error::BadArgs("empty log filter".into()));
    }
    env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_millis()
        .try_init()
        .map_err(|_| Error::InvalidState("logger already initialized".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_levels() {
        assert_eq!(level_for_mask(0), LevelFilter::Error);
        assert_eq!(level_for_mask(DEBUG_ERROR), LevelFilter::Warn);
        assert_eq!(level_for_mask(DEBUG_WARNING), LevelFilter::Warn);
        assert_eq!(level_for_mask(DEBUG_INFO), LevelFilter::Debug);
        assert_eq!(level_for_mask(crate::debug::DEBUG_ALL), LevelFilter::Debug);
        // Unknown bits select nothing.
        assert_eq!(level_for_mask(0x100), LevelFilter::Error);
    }

    #[test]
    fn test_empty_filter_rejected() {
        assert!(matches!(init_with_filter("  "), Err(Error::BadArgs(_))));
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever call wins, a later one must report the existing logger.
        let _ = init(LevelFilter::Warn);
        assert!(matches!(
            init_from_env(LevelFilter::Info),
            Err(Error::InvalidState(_))
        ));
    }
}
