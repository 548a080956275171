// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)]

//! Cross-handle IPC integration tests
//!
//! Two handles opened on the same key behave like two processes: they see
//! the same semaphore state and the same segment bytes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use ulapi::{BackendMode, Disposition, IpcKey, Semaphore, SharedMemory, Ulapi};

fn unique_key() -> IpcKey {
    IpcKey::new(fastrand::i32(0x4000_0000..0x4fff_ffff)).expect("non-zero key")
}

#[test]
fn test_semaphore_guards_shared_counter() {
    let ulapi = Ulapi::initialize(BackendMode::Default).expect("init");
    let sem_key = unique_key();
    let shm_key = unique_key();

    let shm = Arc::new(ulapi.shm_new(shm_key, 8).expect("shm"));
    let sem = Arc::new(Semaphore::open(sem_key).expect("sem"));

    let mut workers = Vec::new();
    for _ in 0..4 {
        // Each worker attaches on its own, as another process would.
        workers.push(thread::spawn(move || {
            let sem = Semaphore::open(sem_key).expect("sem");
            let shm = SharedMemory::attach(shm_key, 8).expect("shm");
            for _ in 0..100 {
                sem.take().expect("take");
                let mut raw = [0u8; 8];
                shm.read_at(0, &mut raw).expect("read");
                let next = u64::from_ne_bytes(raw) + 1;
                shm.write_at(0, &next.to_ne_bytes()).expect("write");
                sem.give().expect("give");
            }
        }));
    }
    for w in workers {
        w.join().expect("worker");
    }

    let mut raw = [0u8; 8];
    shm.read_at(0, &mut raw).expect("read");
    assert_eq!(u64::from_ne_bytes(raw), 400);

    let sem = Arc::try_unwrap(sem).expect("sole owner");
    sem.delete().expect("delete sem");
    let shm = Arc::try_unwrap(shm).expect("sole owner");
    ulapi.shm_delete(shm).expect("delete shm");
    assert!(!SharedMemory::exists(shm_key));
    ulapi.finalize().expect("finalize");
}

#[test]
fn test_semaphore_blocks_until_given() {
    let key = unique_key();
    let (sem, disposition) = Semaphore::open_with_disposition(key).expect("sem");
    assert_eq!(disposition, Disposition::Created);
    sem.take().expect("take");

    let waiter = thread::spawn(move || {
        let sem = Semaphore::open(key).expect("attach");
        sem.take().expect("blocked take");
        sem.give().expect("give");
    });

    thread::sleep(Duration::from_millis(30));
    assert!(!waiter.is_finished());
    sem.give().expect("give");
    waiter.join().expect("waiter");
    sem.delete().expect("delete");
}

#[test]
fn test_addr_is_per_handle() {
    let ulapi = Ulapi::initialize(BackendMode::Default).expect("init");
    let key = unique_key();
    let a = ulapi.shm_new(key, 64).expect("a");
    let b = ulapi.shm_new(key, 64).expect("b");

    // Two attachments map the same bytes at distinct addresses.
    assert_ne!(ulapi.shm_addr(&a), ulapi.shm_addr(&b));
    a.write_at(10, b"xyz").expect("write");
    let mut buf = [0u8; 3];
    b.read_at(10, &mut buf).expect("read");
    assert_eq!(&buf, b"xyz");

    ulapi.shm_delete(a).expect("detach a");
    assert!(SharedMemory::exists(key));
    ulapi.shm_delete(b).expect("destroy");
    assert!(!SharedMemory::exists(key));
}
