// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary semaphores backed by System V semaphore sets.
//!
//! The kernel object outlives the process that created it, so unrelated
//! processes rendezvous on it through its [`IpcKey`]. A freshly created
//! semaphore starts *given*.
//!
//! # Binary semantics
//!
//! `give` reads the current value first and does nothing when the semaphore
//! is already available, so the value never leaves the `{0, 1}` range through
//! this API.
//!
//! # Lifetime
//!
//! Dropping a [`Semaphore`] only forgets the id. [`Semaphore::delete`]
//! removes the kernel object for every process sharing the key.

use crate::config::SEM_PERMISSIONS;
use crate::debug::diag;
use crate::error::{Error, Result};
use crate::ipc::{Disposition, IpcKey, KeyedResource};
use std::io;

const SEM_TAKE: libc::c_short = -1;
const SEM_GIVE: libc::c_short = 1;

/// Handle to a keyed binary semaphore.
#[derive(Debug)]
pub struct Semaphore {
    key: IpcKey,
    semid: libc::c_int,
}

impl Semaphore {
    /// Attach to the semaphore named `key`, creating it (given) if absent.
    pub fn open(key: IpcKey) -> Result<Self> {
        Self::open_keyed(key, ()).map(|(sem, _)| sem)
    }

    /// Like [`open`](Self::open), also reporting whether the object was created.
    pub fn open_with_disposition(key: IpcKey) -> Result<(Self, Disposition)> {
        Self::open_keyed(key, ())
    }

    /// Kernel semaphore-set id.
    #[must_use]
    pub fn id(&self) -> libc::c_int {
        self.semid
    }

    /// Block until the semaphore is available, then take it.
    ///
    /// # Errors
    ///
    /// `Io` if the object was removed (`EIDRM`) or the call failed.
    pub fn take(&self) -> Result<()> {
        loop {
            match self.op(SEM_TAKE, 0) {
                Ok(()) => return Ok(()),
                // A signal interrupted the wait; the semaphore state is unchanged.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    diag!("semop(take)", e);
                    return Err(Error::Io(e));
                }
            }
        }
    }

    /// Take the semaphore if it is available. Returns `false` if it is taken.
    pub fn try_take(&self) -> Result<bool> {
        match self.op(SEM_TAKE, libc::IPC_NOWAIT as libc::c_short) {
            Ok(()) => Ok(true),
            Err(e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(false),
            Err(e) => {
                diag!("semop(try_take)", e);
                Err(Error::Io(e))
            }
        }
    }

    /// Make the semaphore available. A no-op if it already is.
    pub fn give(&self) -> Result<()> {
        if self.value()? >= 1 {
            return Ok(());
        }
        // Another task may take it again before our increment lands; it then
        // blocks and this give releases it.
        self.op(SEM_GIVE, 0).map_err(|e| {
            diag!("semop(give)", e);
            Error::Io(e)
        })
    }

    /// Current value (1 = given, 0 = taken).
    pub fn value(&self) -> Result<i32> {
        // SAFETY:
        // - semid came from a successful semget
        // - GETVAL takes no fourth argument
        let value = unsafe { libc::semctl(self.semid, 0, libc::GETVAL) };
        if value < 0 {
            let e = Error::last_os_error();
            diag!("semctl(GETVAL)", e);
            return Err(e);
        }
        Ok(value)
    }

    /// Remove the kernel object. Every other handle on this key becomes invalid.
    pub fn delete(self) -> Result<()> {
        remove_set(self.semid)?;
        log::debug!("[SEM] removed semaphore key={} id={}", self.key, self.semid);
        Ok(())
    }

    fn op(&self, delta: libc::c_short, flags: libc::c_short) -> io::Result<()> {
        let mut sops = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: flags,
        };
        // SAFETY:
        // - semid came from a successful semget on a one-element set
        // - sops is a valid sembuf on the stack and nsops is 1
        let rc = unsafe { libc::semop(self.semid, &mut sops, 1) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl KeyedResource for Semaphore {
    type Params = ();

    fn open_keyed(key: IpcKey, _params: ()) -> Result<(Self, Disposition)> {
        loop {
            // Look for an existing set first; only create when it is missing.
            // SAFETY: semget has no pointer arguments.
            let semid = unsafe { libc::semget(key.as_key_t(), 1, SEM_PERMISSIONS) };
            if semid >= 0 {
                log::debug!("[SEM] attached key={} id={}", key, semid);
                return Ok((Self { key, semid }, Disposition::Attached));
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                diag!("semget", err);
                return Err(Error::Io(err));
            }

            // SAFETY: semget has no pointer arguments.
            let semid = unsafe {
                libc::semget(
                    key.as_key_t(),
                    1,
                    SEM_PERMISSIONS | libc::IPC_CREAT | libc::IPC_EXCL,
                )
            };
            if semid < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EEXIST) {
                    // Another process created it between the two calls.
                    continue;
                }
                diag!("semget(IPC_CREAT)", err);
                return Err(Error::Io(err));
            }

            let sem = Self { key, semid };
            if let Err(e) = sem.op(SEM_GIVE, 0) {
                diag!("semop(initial give)", e);
                let _ = remove_set(semid);
                return Err(Error::Io(e));
            }
            log::debug!("[SEM] created key={} id={}", key, semid);
            return Ok((sem, Disposition::Created));
        }
    }

    fn key(&self) -> IpcKey {
        self.key
    }
}

fn remove_set(semid: libc::c_int) -> Result<()> {
    // SAFETY:
    // - semid came from a successful semget
    // - IPC_RMID takes no fourth argument
    let rc = unsafe { libc::semctl(semid, 0, libc::IPC_RMID) };
    if rc < 0 {
        let e = Error::last_os_error();
        diag!("semctl(IPC_RMID)", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_key() -> IpcKey {
        IpcKey::new(fastrand::i32(0x5000_0000..0x5fff_ffff)).expect("non-zero key")
    }

    #[test]
    fn test_create_then_attach() {
        let key = unique_key();
        let (first, d1) = Semaphore::open_with_disposition(key).expect("create");
        let (second, d2) = Semaphore::open_with_disposition(key).expect("attach");

        assert_eq!(d1, Disposition::Created);
        assert_eq!(d2, Disposition::Attached);
        assert_eq!(first.id(), second.id());
        assert_eq!(first.key(), key);
        assert_eq!(first.value().expect("value"), 1);

        drop(second);
        first.delete().expect("delete");
    }

    #[test]
    fn test_give_is_idempotent() {
        let sem = Semaphore::open(unique_key()).expect("open");
        sem.give().expect("give");
        sem.give().expect("give");
        assert_eq!(sem.value().expect("value"), 1);

        sem.take().expect("take");
        assert_eq!(sem.value().expect("value"), 0);
        sem.give().expect("give");
        assert_eq!(sem.value().expect("value"), 1);

        sem.delete().expect("delete");
    }

    #[test]
    fn test_try_take() {
        let sem = Semaphore::open(unique_key()).expect("open");
        assert!(sem.try_take().expect("try_take"));
        assert!(!sem.try_take().expect("try_take"));
        sem.give().expect("give");
        assert!(sem.try_take().expect("try_take"));
        sem.delete().expect("delete");
    }

    #[test]
    fn test_delete_invalidates_other_handles() {
        let key = unique_key();
        let a = Semaphore::open(key).expect("open");
        let b = Semaphore::open(key).expect("open");
        a.delete().expect("delete");
        assert!(b.value().is_err());
    }
}
