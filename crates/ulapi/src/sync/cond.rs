// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Condition variable paired with a ULAPI [`Mutex`].
//!
//! Monitor discipline applies: hold the mutex before `wait`, and re-check the
//! predicate after it returns. Wakeups are not guaranteed to be exact.

use super::Mutex;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex as PlMutex};

/// Condition variable.
#[derive(Debug, Default)]
pub struct Cond {
    /// Bumped by every signal/broadcast.
    generation: PlMutex<u64>,
    cv: Condvar,
}

impl Cond {
    /// Create a condition variable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake one waiter.
    pub fn signal(&self) -> Result<()> {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cv.notify_one();
        Ok(())
    }

    /// Wake every waiter.
    pub fn broadcast(&self) -> Result<()> {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cv.notify_all();
        Ok(())
    }

    /// Release `mutex`, block until signalled, then retake `mutex`.
    ///
    /// The release and the start of the wait are atomic with respect to
    /// `signal`/`broadcast`: a signal issued after the caller gave up the
    /// mutex is never lost.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `mutex` is not held.
    pub fn wait(&self, mutex: &Mutex) -> Result<()> {
        let mut generation = self.generation.lock();
        if !mutex.is_held() {
            return Err(Error::InvalidState(
                "cond wait requires the paired mutex to be held".into(),
            ));
        }
        let start = *generation;
        mutex.give()?;
        while *generation == start {
            self.cv.wait(&mut generation);
        }
        drop(generation);
        mutex.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_requires_mutex() {
        let cond = Cond::new();
        let m = Mutex::new();
        assert!(matches!(cond.wait(&m), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let cond = Arc::new(Cond::new());
        let m = Arc::new(Mutex::new());
        let ready = Arc::new(AtomicBool::new(false));

        let (c2, m2, r2) = (Arc::clone(&cond), Arc::clone(&m), Arc::clone(&ready));
        let waiter = thread::spawn(move || {
            m2.take().expect("take");
            while !r2.load(Ordering::SeqCst) {
                c2.wait(&m2).expect("wait");
            }
            assert!(m2.is_held());
            m2.give().expect("give");
        });

        thread::sleep(Duration::from_millis(20));
        m.take().expect("take");
        ready.store(true, Ordering::SeqCst);
        cond.signal().expect("signal");
        m.give().expect("give");

        waiter.join().expect("waiter");
    }

    #[test]
    fn test_broadcast_wakes_all() {
        let cond = Arc::new(Cond::new());
        let m = Arc::new(Mutex::new());
        let go = Arc::new(AtomicBool::new(false));
        let woken = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let (c, m, go, woken) = (
                Arc::clone(&cond),
                Arc::clone(&m),
                Arc::clone(&go),
                Arc::clone(&woken),
            );
            handles.push(thread::spawn(move || {
                m.take().expect("take");
                while !go.load(Ordering::SeqCst) {
                    c.wait(&m).expect("wait");
                }
                woken.fetch_add(1, Ordering::SeqCst);
                m.give().expect("give");
            }));
        }

        thread::sleep(Duration::from_millis(30));
        m.take().expect("take");
        go.store(true, Ordering::SeqCst);
        cond.broadcast().expect("broadcast");
        m.give().expect("give");

        for h in handles {
            h.join().expect("waiter");
        }
        assert_eq!(woken.load(Ordering::SeqCst), 3);
    }
}
