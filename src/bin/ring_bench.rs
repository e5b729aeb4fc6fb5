//! MPMC ring buffer throughput benchmark.
//!
//! Usage:
//!     cargo run --release --bin ring_bench
//!
//! Environment variables:
//!     PRODUCERS=4      Number of producer threads (default: 4)
//!     CONSUMERS=4      Number of consumer threads (default: 4)
//!     RECORDS=1000000  8-byte records per producer (default: 1,000,000)
//!     RING_CAPACITY=65536  Requested ring capacity in bytes
//!     PIN_CPUS=1       Pin threads to consecutive CPUs starting at 0

use std::env;
use std::sync::Arc;
use std::thread;

use minstant::Instant;

use scatter::ConcurrentRingBuffer;

const RECORD_LEN: usize = 8;

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn pin_to_cpu(id: usize) {
    core_affinity::set_for_current(core_affinity::CoreId { id });
}

fn main() {
    scatter::init_tracing();

    let producers = env_usize("PRODUCERS", 4);
    let consumers = env_usize("CONSUMERS", 4);
    let records = env_usize("RECORDS", 1_000_000);
    let capacity = env_usize("RING_CAPACITY", 65_536);
    let pin = env_usize("PIN_CPUS", 1) != 0;

    // Every byte enqueued must be dequeued for the consumers to finish.
    assert!(
        (producers * records) % consumers == 0,
        "PRODUCERS * RECORDS must divide evenly among CONSUMERS"
    );
    let records_per_consumer = producers * records / consumers;

    let ring = Arc::new(ConcurrentRingBuffer::new(capacity));
    println!(
        "ring_bench: {producers}p/{consumers}c, {records} records/producer, \
         buffer {} bytes",
        ring.buffer_size()
    );

    let start = Instant::now();

    let mut handles = Vec::new();
    for p in 0..producers {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            if pin {
                pin_to_cpu(p);
            }
            for i in 0..records {
                let record = ((p as u64) << 32 | i as u64).to_le_bytes();
                while ring.try_bulk_enqueue_fixed::<RECORD_LEN>(&record).is_err() {
                    thread::yield_now();
                }
            }
        }));
    }

    for c in 0..consumers {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            if pin {
                pin_to_cpu(producers + c);
            }
            let mut dst = [0u8; RECORD_LEN];
            for _ in 0..records_per_consumer {
                while ring.try_bulk_dequeue_fixed::<RECORD_LEN>(&mut dst).is_err() {
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let elapsed = start.elapsed();
    let total = (producers * records) as f64;
    println!(
        "moved {total:.0} records ({} bytes) in {elapsed:?}: {:.2}M records/s",
        producers * records * RECORD_LEN,
        total / elapsed.as_secs_f64() / 1e6
    );
}
