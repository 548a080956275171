// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monotonic clock and high-resolution sleep.
//!
//! `CLOCK_MONOTONIC` is read directly so that timestamps taken by different
//! processes on the same host are comparable.

use crate::config::DEFAULT_WAIT_OFFSET_NS;
use crate::error::{Error, Result};
use std::time::Duration;

/// Current monotonic time since an arbitrary, fixed origin.
#[must_use]
pub fn now() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY:
    // - ts is a valid, writable timespec on the stack
    // - CLOCK_MONOTONIC is always available on supported targets
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

/// Current monotonic time in seconds.
#[must_use]
pub fn time() -> f64 {
    now().as_secs_f64()
}

/// Sleep for `secs` seconds. Non-positive values return immediately.
///
/// # Errors
///
/// `BadArgs` for NaN, infinite, or unrepresentably long durations.
pub fn sleep(secs: f64) -> Result<()> {
    if !secs.is_finite() {
        return Err(Error::BadArgs(format!("sleep duration is not finite: {secs}")));
    }
    if secs > 0.0 {
        let span = Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::BadArgs(format!("sleep duration {secs}: {e}")))?;
        std::thread::sleep(span);
    }
    Ok(())
}

/// Sleep for one period, less the default call-overhead offset.
pub fn wait(period: Duration) {
    wait_with_offset(period, DEFAULT_WAIT_OFFSET_NS);
}

/// Sleep for `period - offset_ns`, never less than one nanosecond.
pub fn wait_with_offset(period: Duration, offset_ns: u64) {
    let period_ns = period.as_nanos().min(u128::from(u64::MAX)) as u64;
    let adjusted = if period_ns < offset_ns.saturating_add(1) {
        1
    } else {
        period_ns - offset_ns
    };
    std::thread::sleep(Duration::from_nanos(adjusted));
}

/// Sleep until the monotonic clock reaches `deadline`.
///
/// Returns immediately if the deadline has already passed.
pub fn sleep_until(deadline: Duration) {
    #[cfg(target_os = "linux")]
    {
        let ts = libc::timespec {
            tv_sec: deadline.as_secs() as libc::time_t,
            tv_nsec: deadline.subsec_nanos() as libc::c_long,
        };
        loop {
            // SAFETY:
            // - ts is a valid timespec describing an absolute CLOCK_MONOTONIC instant
            // - the remaining-time pointer may be null with TIMER_ABSTIME
            let rc = unsafe {
                libc::clock_nanosleep(
                    libc::CLOCK_MONOTONIC,
                    libc::TIMER_ABSTIME,
                    &ts,
                    std::ptr::null_mut(),
                )
            };
            // Interrupted absolute sleeps resume against the same deadline.
            if rc != libc::EINTR {
                break;
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let current = now();
        if deadline > current {
            std::thread::sleep(deadline - current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = time();
        let b = time();
        assert!(b >= a);
        assert!(a > 0.0);
    }

    #[test]
    fn test_sleep_duration() {
        let start = now();
        sleep(0.02).expect("sleep");
        let elapsed = now() - start;
        assert!(elapsed >= Duration::from_millis(19));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_sleep_rejects_nan() {
        assert!(matches!(sleep(f64::NAN), Err(Error::BadArgs(_))));
        assert!(sleep(-1.0).is_ok());
    }

    #[test]
    fn test_sleep_rejects_overflowing_duration() {
        assert!(matches!(sleep(1e20), Err(Error::BadArgs(_))));
        assert!(matches!(sleep(f64::MAX), Err(Error::BadArgs(_))));
    }

    #[test]
    fn test_wait_clamps_small_periods() {
        let start = now();
        wait_with_offset(Duration::from_nanos(0), 1000);
        wait(Duration::from_nanos(1));
        assert!(now() - start < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_until() {
        let deadline = now() + Duration::from_millis(15);
        sleep_until(deadline);
        assert!(now() >= deadline);

        // Past deadline returns immediately.
        let start = now();
        sleep_until(Duration::from_secs(0));
        assert!(now() - start < Duration::from_secs(1));
    }
}
