// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronization Latency Benchmark
//!
//! Measures uncontended round trips of:
//! - process-local mutex take/give
//! - System V semaphore take/give (two syscalls per round trip)
//! - cond signal with no waiter
//! - FIFO write+read of small payloads

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box as bb;
use ulapi::{Cond, Fifo, IpcKey, Mutex, Semaphore};

fn bench_mutex(c: &mut Criterion) {
    let mutex = Mutex::new();
    c.bench_function("mutex_take_give", |b| {
        b.iter(|| {
            mutex.take().expect("take");
            mutex.give().expect("give");
        });
    });
}

fn bench_semaphore(c: &mut Criterion) {
    let key = IpcKey::new(fastrand::i32(0x7000_0000..0x7fff_ffff)).expect("key");
    let sem = Semaphore::open(key).expect("semaphore");
    c.bench_function("semaphore_take_give", |b| {
        b.iter(|| {
            sem.take().expect("take");
            sem.give().expect("give");
        });
    });
    sem.delete().expect("delete");
}

fn bench_cond_signal(c: &mut Criterion) {
    let cond = Cond::new();
    c.bench_function("cond_signal_no_waiter", |b| {
        b.iter(|| cond.signal().expect("signal"));
    });
}

fn bench_fifo_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_roundtrip");
    let dir = tempfile::tempdir().expect("tempdir");
    let fifo = Fifo::open_in(dir.path(), 1, 65536).expect("fifo");

    for size in [8usize, 64, 512, 4096] {
        let payload = vec![0x5A; size];
        let mut buf = vec![0u8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                fifo.write(bb(&payload)).expect("write");
                fifo.read(&mut buf).expect("read");
            });
        });
    }

    group.finish();
    fifo.delete().expect("delete");
}

criterion_group!(
    benches,
    bench_mutex,
    bench_semaphore,
    bench_cond_signal,
    bench_fifo_roundtrip
);
criterion_main!(benches);
