// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! System V shared memory segments.
//!
//! Provides safe wrappers around `shmget`, `shmat`, `shmdt` and `shmctl`.
//!
//! # Segment Lifecycle
//!
//! 1. Every process calls [`SharedMemory::attach`] with the agreed key
//! 2. The first caller creates the (zero-filled) segment, later callers reuse it
//! 3. Each process resolves its own base address with [`SharedMemory::addr`];
//!    addresses are not transferable between processes
//! 4. [`SharedMemory::delete`] detaches and destroys the segment once no
//!    process remains attached
//!
//! Dropping a handle detaches without destroying.

use crate::config::SHM_PERMISSIONS;
use crate::debug::diag;
use crate::error::{Error, Result};
use crate::ipc::{Disposition, IpcKey, KeyedResource};
use std::io;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

/// Attached System V shared memory segment.
#[derive(Debug)]
pub struct SharedMemory {
    key: IpcKey,
    shmid: libc::c_int,
    /// Base of the attachment in this process
    ptr: NonNull<u8>,
    /// Size requested by this process
    size: usize,
    /// Pages locked with mlock (real-time backend)
    locked: bool,
}

// SAFETY: the attachment is plain shared memory; coordinating concurrent
// access to its contents is the caller's job (typically via a Semaphore).
unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl SharedMemory {
    /// Attach to the segment named `key`, creating `size` bytes if absent.
    ///
    /// # Errors
    ///
    /// - `BadArgs` if `size` is zero or an existing segment is smaller than `size`
    /// - `Io` if the segment cannot be created or attached
    pub fn attach(key: IpcKey, size: usize) -> Result<Self> {
        Self::open_keyed(key, size).map(|(shm, _)| shm)
    }

    /// Like [`attach`](Self::attach), also reporting whether the segment was created.
    pub fn attach_with_disposition(key: IpcKey, size: usize) -> Result<(Self, Disposition)> {
        Self::open_keyed(key, size)
    }

    /// Base address of the segment in the calling process.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Raw pointer to the mapped memory.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Size requested at attach time.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Kernel segment id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> libc::c_int {
        self.shmid
    }

    /// Copy `data` into the segment at `offset`.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        // SAFETY:
        // - offset + len <= size was checked above, and size bytes are attached
        // - data cannot overlap the segment: it is a Rust slice borrowed here
        //   while the segment is only reachable through raw pointers
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.as_ptr().add(offset), data.len());
        }
        Ok(())
    }

    /// Copy `buf.len()` bytes out of the segment starting at `offset`.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        // SAFETY: same bounds argument as write_at; buf is exclusively borrowed.
        unsafe {
            ptr::copy_nonoverlapping(self.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::BadArgs(format!(
                "range {}+{} outside segment of {} bytes",
                offset, len, self.size
            ))),
        }
    }

    /// Number of attachments across all processes.
    pub fn attachments(&self) -> Result<u64> {
        stat(self.shmid).map(|ds| ds.shm_nattch as u64)
    }

    /// Check whether a segment exists for `key`.
    #[must_use]
    pub fn exists(key: IpcKey) -> bool {
        // SAFETY: shmget has no pointer arguments.
        unsafe { libc::shmget(key.as_key_t(), 0, SHM_PERMISSIONS) >= 0 }
    }

    /// Lock the attached pages into RAM.
    pub(crate) fn lock_pages(&mut self) -> Result<()> {
        if self.locked {
            return Ok(());
        }
        // SAFETY: ptr/size describe the live attachment made in attach_id.
        let rc = unsafe { libc::mlock(self.as_ptr() as *const libc::c_void, self.size) };
        if rc < 0 {
            let e = Error::last_os_error();
            diag!("mlock", e);
            return Err(e);
        }
        self.locked = true;
        Ok(())
    }

    /// Detach, and destroy the segment if no other attachment remains.
    pub fn delete(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        this.release_attachment()?;

        let remaining = match stat(this.shmid) {
            Ok(ds) => ds.shm_nattch,
            Err(e) if segment_gone(&e) => {
                log::debug!("[SHM] segment key={} id={} already removed", this.key, this.shmid);
                return Ok(());
            }
            Err(_) => 0,
        };
        if remaining == 0 {
            match remove_segment(this.shmid) {
                Ok(()) => {}
                Err(e) if segment_gone(&e) => {}
                Err(e) => return Err(e),
            }
            log::debug!("[SHM] destroyed segment key={} id={}", this.key, this.shmid);
        } else {
            log::debug!(
                "[SHM] detached key={} id={} ({} attachments remain)",
                this.key,
                this.shmid,
                remaining
            );
        }
        Ok(())
    }

    fn release_attachment(&self) -> Result<()> {
        if self.locked {
            // SAFETY: the range was locked by lock_pages and is still attached.
            unsafe {
                libc::munlock(self.as_ptr() as *const libc::c_void, self.size);
            }
        }
        // SAFETY:
        // - ptr was returned by a successful shmat and has not been detached
        //   (delete consumes the handle and skips Drop)
        let rc = unsafe { libc::shmdt(self.as_ptr() as *const libc::c_void) };
        if rc < 0 {
            let e = Error::last_os_error();
            diag!("shmdt", e);
            return Err(e);
        }
        Ok(())
    }

    fn attach_id(key: IpcKey, shmid: libc::c_int, size: usize) -> Result<Self> {
        // SAFETY:
        // - shmid came from a successful shmget
        // - a null address lets the kernel choose where to attach
        // - shmat returns (void*)-1 on error, checked below
        let raw = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if raw as isize == -1 {
            let e = Error::last_os_error();
            diag!("shmat", e);
            return Err(e);
        }
        let ptr = NonNull::new(raw.cast::<u8>())
            .ok_or_else(|| Error::InvalidState("shmat returned a null address".into()))?;
        Ok(Self {
            key,
            shmid,
            ptr,
            size,
            locked: false,
        })
    }
}

impl KeyedResource for SharedMemory {
    type Params = usize;

    fn open_keyed(key: IpcKey, size: usize) -> Result<(Self, Disposition)> {
        if size == 0 {
            return Err(Error::BadArgs("shared memory size must be non-zero".into()));
        }

        loop {
            // SAFETY: shmget has no pointer arguments.
            let shmid = unsafe { libc::shmget(key.as_key_t(), 0, SHM_PERMISSIONS) };
            if shmid >= 0 {
                let actual = stat(shmid)?.shm_segsz as usize;
                if actual < size {
                    return Err(Error::BadArgs(format!(
                        "segment {} holds {} bytes, {} requested",
                        key, actual, size
                    )));
                }
                let shm = Self::attach_id(key, shmid, size)?;
                log::debug!("[SHM] attached key={} id={} size={}", key, shmid, size);
                return Ok((shm, Disposition::Attached));
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                diag!("shmget", err);
                return Err(Error::Io(err));
            }

            // SAFETY: shmget has no pointer arguments.
            let shmid = unsafe {
                libc::shmget(
                    key.as_key_t(),
                    size,
                    SHM_PERMISSIONS | libc::IPC_CREAT | libc::IPC_EXCL,
                )
            };
            if shmid < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EEXIST) {
                    continue;
                }
                diag!("shmget(IPC_CREAT)", err);
                return Err(Error::Io(err));
            }

            // The kernel zero-fills new segments.
            match Self::attach_id(key, shmid, size) {
                Ok(shm) => {
                    log::debug!("[SHM] created key={} id={} size={}", key, shmid, size);
                    return Ok((shm, Disposition::Created));
                }
                Err(e) => {
                    let _ = remove_segment(shmid);
                    return Err(e);
                }
            }
        }
    }

    fn key(&self) -> IpcKey {
        self.key
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        // Note: We do NOT destroy here. Only delete() does.
        let _ = self.release_attachment();
    }
}

fn stat(shmid: libc::c_int) -> Result<libc::shmid_ds> {
    // SAFETY: shmid_ds is plain old data; all-zero is a valid bit pattern.
    let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
    // SAFETY: ds is a valid, writable shmid_ds.
    let rc = unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut ds) };
    if rc < 0 {
        let e = Error::last_os_error();
        diag!("shmctl(IPC_STAT)", e);
        return Err(e);
    }
    Ok(ds)
}

/// A peer removed the segment first.
fn segment_gone(e: &Error) -> bool {
    matches!(e, Error::Io(err) if matches!(err.raw_os_error(), Some(libc::EINVAL | libc::EIDRM)))
}

fn remove_segment(shmid: libc::c_int) -> Result<()> {
    // SAFETY: IPC_RMID ignores the buffer argument.
    let rc = unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) };
    if rc < 0 {
        let e = Error::last_os_error();
        diag!("shmctl(IPC_RMID)", e);
        return Err(e);
    }
    Ok(())
}
