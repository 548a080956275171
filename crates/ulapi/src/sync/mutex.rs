// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-local mutual exclusion with explicit take/give.
//!
//! Unlike a guard-based lock, ownership is not tied to a scope: a task takes
//! the mutex, does its work, and gives it back, possibly from another call
//! frame. This is what [`super::Cond::wait`] needs to release and reacquire it.

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex as PlMutex};

/// Non-reentrant mutex. Starts available.
#[derive(Debug, Default)]
pub struct Mutex {
    locked: PlMutex<bool>,
    released: Condvar,
}

impl Mutex {
    /// Create an available mutex.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locked: PlMutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Acquire, blocking until available.
    ///
    /// Taking a mutex the caller already holds blocks forever.
    pub fn take(&self) -> Result<()> {
        let mut locked = self.locked.lock();
        while *locked {
            self.released.wait(&mut locked);
        }
        *locked = true;
        Ok(())
    }

    /// Acquire without blocking. Returns `false` if the mutex is held.
    pub fn try_take(&self) -> bool {
        let mut locked = self.locked.lock();
        if *locked {
            false
        } else {
            *locked = true;
            true
        }
    }

    /// Release.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the mutex is not held.
    pub fn give(&self) -> Result<()> {
        let mut locked = self.locked.lock();
        if !*locked {
            return Err(Error::InvalidState("mutex given while not held".into()));
        }
        *locked = false;
        self.released.notify_one();
        Ok(())
    }

    /// `true` while some task holds the mutex.
    #[must_use]
    pub fn is_held(&self) -> bool {
        *self.locked.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_starts_available() {
        let m = Mutex::new();
        assert!(!m.is_held());
        m.take().expect("take");
        assert!(m.is_held());
        m.give().expect("give");
        assert!(!m.is_held());
    }

    #[test]
    fn test_give_unheld_is_error() {
        let m = Mutex::new();
        assert!(matches!(m.give(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_try_take() {
        let m = Mutex::new();
        assert!(m.try_take());
        assert!(!m.try_take());
        m.give().expect("give");
        assert!(m.try_take());
    }

    #[test]
    fn test_mutual_exclusion() {
        let m = Arc::new(Mutex::new());
        let counter = Arc::new(parking_lot::Mutex::new(0u64));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let m = Arc::clone(&m);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    m.take().expect("take");
                    // Read-modify-write split on purpose; only the ULAPI mutex protects it.
                    let v = *counter.lock();
                    *counter.lock() = v + 1;
                    m.give().expect("give");
                }
            }));
        }
        for h in handles {
            h.join().expect("thread");
        }
        assert_eq!(*counter.lock(), 2000);
    }

    #[test]
    fn test_take_blocks_until_give() {
        let m = Arc::new(Mutex::new());
        m.take().expect("take");

        let m2 = Arc::clone(&m);
        let waiter = thread::spawn(move || {
            m2.take().expect("take");
            m2.give().expect("give");
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        m.give().expect("give");
        waiter.join().expect("waiter");
    }
}
