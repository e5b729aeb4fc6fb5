//! Integration tests for the bulk byte ring buffers.
//!
//! The concurrent schedules here exercise the properties that matter under
//! load: every produced record is consumed exactly once, each consumer sees
//! any single producer's records in order, and the count never exceeds the
//! buffer size.
//!
//! # Running with tracing
//!
//! To see overflow/underflow diagnostics, run with the tracing feature:
//! ```bash
//! cargo test --features tracing -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;

use scatter::{ConcurrentRingBuffer, SerialRingBuffer};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        scatter::init_tracing();
    });
}

/// Packs a `(producer, sequence)` pair into an 8-byte record.
fn record(producer: u32, seq: u32) -> [u8; 8] {
    let value = (u64::from(producer) << 32) | u64::from(seq);
    value.to_le_bytes()
}

fn unpack(bytes: [u8; 8]) -> (u32, u32) {
    let value = u64::from_le_bytes(bytes);
    ((value >> 32) as u32, value as u32)
}

#[test]
fn mpmc_record_exchange() {
    init_test_tracing();

    const PRODUCERS: u32 = 4;
    const CONSUMERS: u32 = 4;
    const RECORDS: u32 = 10_000;

    let ring = Arc::new(ConcurrentRingBuffer::new(1024));
    assert_eq!(ring.buffer_size(), 1024);

    let mut producer_handles = Vec::new();
    for p in 0..PRODUCERS {
        let ring = Arc::clone(&ring);
        producer_handles.push(thread::spawn(move || {
            for i in 0..RECORDS {
                let rec = record(p, i);
                while ring.try_bulk_enqueue_fixed::<8>(&rec).is_err() {
                    thread::yield_now();
                }
            }
        }));
    }

    let mut consumer_handles = Vec::new();
    for _ in 0..CONSUMERS {
        let ring = Arc::clone(&ring);
        consumer_handles.push(thread::spawn(move || {
            let mut seen = Vec::with_capacity(RECORDS as usize);
            let mut dst = [0u8; 8];
            for _ in 0..RECORDS {
                while ring.try_bulk_dequeue_fixed::<8>(&mut dst).is_err() {
                    thread::yield_now();
                }
                seen.push(unpack(dst));
            }
            seen
        }));
    }

    for handle in producer_handles {
        handle.join().unwrap();
    }
    let consumed: Vec<Vec<(u32, u32)>> = consumer_handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert_eq!(ring.count(), 0);

    // Within a single consumer's stream, each producer's records arrive in
    // the order they were enqueued.
    for stream in &consumed {
        let mut last = vec![None::<u32>; PRODUCERS as usize];
        for &(producer, seq) in stream {
            let prev = &mut last[producer as usize];
            if let Some(p) = *prev {
                assert!(p < seq, "producer {producer}: {seq} after {p}");
            }
            *prev = Some(seq);
        }
    }

    // The multiset of consumed records equals the multiset produced.
    let mut all: Vec<(u32, u32)> = consumed.into_iter().flatten().collect();
    all.sort_unstable();
    let mut expected: Vec<(u32, u32)> = (0..PRODUCERS)
        .flat_map(|p| (0..RECORDS).map(move |i| (p, i)))
        .collect();
    expected.sort_unstable();
    assert_eq!(all, expected);
}

#[test]
fn count_stays_within_buffer_size_under_load() {
    init_test_tracing();

    const CHUNK: usize = 4;
    const CHUNKS: usize = 5_000;

    let ring = Arc::new(ConcurrentRingBuffer::new(64));
    let done = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            let payload = [0xabu8; CHUNK];
            for _ in 0..CHUNKS {
                while ring.try_bulk_enqueue(&payload).is_err() {
                    thread::yield_now();
                }
            }
        }));
    }
    for _ in 0..2 {
        let ring = Arc::clone(&ring);
        handles.push(thread::spawn(move || {
            let mut dst = [0u8; CHUNK];
            for _ in 0..CHUNKS {
                while ring.try_bulk_dequeue(&mut dst).is_err() {
                    thread::yield_now();
                }
                assert_eq!(dst, [0xab; CHUNK]);
            }
        }));
    }

    // Sample the count while the exchange runs.
    let sampler = {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                assert!(ring.count() <= ring.buffer_size());
                thread::yield_now();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    sampler.join().unwrap();

    assert_eq!(ring.count(), 0);
}

#[test]
fn serial_random_stream_preserves_fifo() {
    init_test_tracing();

    let mut ring = SerialRingBuffer::new(64);
    let mut produced: Vec<u8> = Vec::new();
    let mut consumed: Vec<u8> = Vec::new();
    let mut next: u64 = 0;

    for _ in 0..2_000 {
        let enqueue_len = (rand::random::<u32>() % 24) as usize;
        let chunk: Vec<u8> = (0..enqueue_len)
            .map(|_| {
                let byte = next as u8;
                next = next.wrapping_add(1);
                byte
            })
            .collect();
        if ring.try_bulk_enqueue(&chunk).is_ok() {
            produced.extend_from_slice(&chunk);
        } else {
            next = next.wrapping_sub(enqueue_len as u64);
        }

        let dequeue_len = ((rand::random::<u32>() % 24) as usize).min(ring.count());
        let mut dst = vec![0u8; dequeue_len];
        ring.try_bulk_dequeue(&mut dst).unwrap();
        consumed.extend_from_slice(&dst);
    }

    // Drain the remainder; the out-stream must be a prefix of the in-stream,
    // and after draining they are equal.
    let remaining = ring.count();
    let mut dst = vec![0u8; remaining];
    ring.try_bulk_dequeue(&mut dst).unwrap();
    consumed.extend_from_slice(&dst);

    assert_eq!(produced, consumed);
}

#[test]
fn serial_slice_reconstruction_sweep() {
    // Wrap the live payload around the buffer end, then check every valid
    // (start, length) window against the logical byte stream.
    let mut ring = SerialRingBuffer::new(16);

    let mut logical: Vec<u8> = Vec::new();
    ring.try_bulk_enqueue(&(0..10).collect::<Vec<u8>>()).unwrap();
    let mut drop6 = [0u8; 6];
    ring.try_bulk_dequeue(&mut drop6).unwrap();
    logical.extend(6..10u8);

    ring.try_bulk_enqueue(&(10..18).collect::<Vec<u8>>()).unwrap();
    logical.extend(10..18u8);

    assert_eq!(ring.count(), logical.len());

    for start in 0..=logical.len() {
        for length in 0..=(logical.len() - start) {
            let view = ring.slice(start, length);
            let mut out = vec![0u8; length];
            view.copy_to_slice(&mut out);
            assert_eq!(out, &logical[start..start + length], "window [{start}, {length})");
        }
    }
}

#[test]
fn concurrent_wrapping_byte_stream() {
    init_test_tracing();

    // One producer, one consumer, chunk sizes chosen so claimed ranges
    // repeatedly cross the wrap boundary of a tiny ring.
    const TOTAL: usize = 30_000;

    let ring = Arc::new(ConcurrentRingBuffer::new(32));
    let producer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut next: u64 = 0;
            let mut sent = 0;
            while sent < TOTAL {
                let len = (sent % 13).clamp(1, 12).min(TOTAL - sent);
                let chunk: Vec<u8> = (0..len)
                    .map(|i| (next + i as u64) as u8)
                    .collect();
                if ring.try_bulk_enqueue(&chunk).is_ok() {
                    next += len as u64;
                    sent += len;
                } else {
                    thread::yield_now();
                }
            }
        })
    };

    let consumer = {
        let ring = Arc::clone(&ring);
        thread::spawn(move || {
            let mut expected: u64 = 0;
            let mut received = 0;
            while received < TOTAL {
                let len = (received % 13).clamp(1, 12).min(TOTAL - received);
                let mut dst = vec![0u8; len];
                if ring.try_bulk_dequeue(&mut dst).is_ok() {
                    for &byte in &dst {
                        assert_eq!(byte, expected as u8);
                        expected += 1;
                    }
                    received += len;
                } else {
                    thread::yield_now();
                }
            }
        })
    };

    producer.join().unwrap();
    consumer.join().unwrap();
    assert_eq!(ring.count(), 0);
}

#[test]
fn ffi_smoke() {
    use scatter::ffi;

    let ring = ffi::create_ring_buffer(5);
    assert!(!ring.is_null());
    assert_eq!(ffi::ring_buffer_get_buffer_size(ring), 8);

    let src = [0x01u8, 0x02, 0x03, 0x04];
    assert!(ffi::ring_buffer_try_bulk_enqueue(ring, src.as_ptr(), src.len()));
    assert_eq!(ffi::ring_buffer_get_count(ring), 4);

    let mut dst = [0u8; 4];
    assert!(ffi::ring_buffer_try_bulk_dequeue(ring, dst.as_mut_ptr(), dst.len()));
    assert_eq!(dst, src);
    assert_eq!(ffi::ring_buffer_get_count(ring), 0);

    ffi::release_ring_buffer(ring);

    assert!(ffi::create_ring_buffer(0).is_null());
    assert_eq!(ffi::ring_buffer_get_count(std::ptr::null()), 0);
}
