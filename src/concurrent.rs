//! Lock-free MPMC bounded byte ring buffer.
//!
//! This module adapts Dmitry Vyukov's bounded MPMC queue from per-cell slots
//! to bulk byte ranges:
//!
//! - Each byte slot has an atomic sequence number, initialized to its index
//! - A producer claims the range `[p, p + len)` with a single CAS on the
//!   enqueue position; a consumer claims `[p, p + len)` with a CAS on the
//!   dequeue position. The CAS is the linearization point of the bulk
//!   operation.
//! - Inside a claimed range, each slot is handed off individually: the
//!   writer waits for `seq == p + i`, stores the byte, publishes
//!   `seq = p + i + 1`; the reader waits for `seq == p + i + 1`, loads the
//!   byte, publishes `seq = p + i + N` (the slot's next producer turn).
//!
//! The per-slot handoff is what makes ranges that cross the wrap boundary,
//! or overlap a concurrent operation's still-unpublished slots, safe: the
//! claim orders whole operations, the sequence stamps carry byte visibility
//! (producer Release, consumer Acquire).
//!
//! Positions are relaxed atomics; they only ever grow, and every
//! happens-before edge the payload needs goes through the sequence stamps.
//!
//! # Spin policy
//!
//! A claim attempt that hits contention backs off by yielding the CPU up to
//! 32 times before retrying (`spin_once`). Slot waits inside a committed
//! copy use [`std::hint::spin_loop`]: the prior owner is mid-operation and
//! the wait is bounded. Neither is an error path; both are the success path
//! under load. The queue never suspends a caller.

use std::cell::UnsafeCell;
use std::hint;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crate::error::RingError;
use crate::span::SliceView;
use crate::trace;

/// Yield budget of one backoff round.
const SPIN_YIELD_LIMIT: u32 = 32;

/// Bounded CPU-yield backoff between claim attempts.
#[inline]
fn spin_once() {
    for _ in 0..SPIN_YIELD_LIMIT {
        thread::yield_now();
    }
}

/// Enqueue position, on its own cache line to keep producer CAS traffic away
/// from the consumer side.
#[repr(C, align(64))]
struct ProducerPosition {
    pos: AtomicU64,
}

/// Dequeue position, cache-line isolated likewise.
#[repr(C, align(64))]
struct ConsumerPosition {
    pos: AtomicU64,
}

/// Bounded byte ring buffer, linearizable under concurrent producers and
/// consumers.
///
/// Shares the [`SerialRingBuffer`](crate::serial::SerialRingBuffer) contract:
/// power-of-two capacity fixed at construction, all-or-nothing bulk
/// operations, monotonic `u64` positions.
///
/// Bulk enqueue/dequeue take `&self` and are safe to call from any number of
/// threads. The inspection helpers ([`clear`](Self::clear),
/// [`slice`](Self::slice), [`value_at`](Self::value_at), …) take `&mut self`:
/// they are not linearizable, and the exclusive borrow turns the "call only
/// under quiescence" contract into a compile-time guarantee.
pub struct ConcurrentRingBuffer {
    enqueue: ProducerPosition,
    dequeue: ConsumerPosition,
    /// Per-slot turn stamps; `sequence[i]` starts at `i`.
    sequence: Box<[AtomicU64]>,
    buffer: Box<[UnsafeCell<u8>]>,
    mask: u64,
}

// SAFETY: All shared state is either atomic (positions, sequence stamps) or
// protected by the sequence protocol: a buffer slot is written only by the
// producer whose turn the stamp shows and read only by the matching consumer,
// with Release/Acquire handoff in between.
unsafe impl Send for ConcurrentRingBuffer {}
unsafe impl Sync for ConcurrentRingBuffer {}

impl ConcurrentRingBuffer {
    /// Creates a ring with at least `capacity` bytes of storage.
    ///
    /// The backing buffer is the smallest power of two >= `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring capacity must be at least 1");
        let size = capacity.next_power_of_two();

        let mut buffer = Vec::with_capacity(size);
        buffer.resize_with(size, || UnsafeCell::new(0u8));

        let sequence: Vec<AtomicU64> = (0..size as u64).map(AtomicU64::new).collect();

        Self {
            enqueue: ProducerPosition {
                pos: AtomicU64::new(0),
            },
            dequeue: ConsumerPosition {
                pos: AtomicU64::new(0),
            },
            sequence: sequence.into_boxed_slice(),
            buffer: buffer.into_boxed_slice(),
            mask: (size - 1) as u64,
        }
    }

    /// Size of the backing buffer (a power of two).
    #[inline]
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Number of buffered bytes.
    ///
    /// Under concurrency this is a snapshot of two relaxed loads and may lag
    /// in-flight operations; it is exact under quiescence.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        let enqueue = self.enqueue.pos.load(Ordering::Relaxed);
        let dequeue = self.dequeue.pos.load(Ordering::Relaxed);
        enqueue.saturating_sub(dequeue) as usize
    }

    /// Attempts to enqueue all of `src`.
    ///
    /// Lock-free: on contention the claim is retried after a bounded spin.
    /// The operation takes effect atomically at the position CAS.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Overflow`] if `src.len()` exceeds the free
    /// capacity observed at the failed attempt; the ring is unchanged.
    pub fn try_bulk_enqueue(&self, src: &[u8]) -> Result<(), RingError> {
        if src.is_empty() {
            return Ok(());
        }
        let len = src.len() as u64;

        loop {
            let pos = self.enqueue.pos.load(Ordering::Relaxed);
            let seq = self.sequence[(pos & self.mask) as usize].load(Ordering::Acquire);
            let diff = seq as i64 - pos as i64;

            // Signed: the dequeue position is loaded after the enqueue
            // position and may have moved past it.
            let count = pos as i64 - self.dequeue.pos.load(Ordering::Relaxed) as i64;
            let free = self.buffer.len() as i64 - count;

            if diff == 0 && len as i64 <= free {
                if self
                    .enqueue
                    .pos
                    .compare_exchange_weak(pos, pos + len, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: The CAS claimed [pos, pos + len) exclusively.
                    unsafe { self.write_range(pos, src) };
                    return Ok(());
                }
            } else if len as i64 > free {
                let free = free.max(0) as usize;
                trace::warn!(requested = src.len(), free, "bulk enqueue overflow");
                return Err(RingError::Overflow {
                    requested: src.len(),
                    free,
                });
            }
            // Lost the CAS, or the head slot is mid-recycle (a consumer's
            // release publish is still in flight). Not an overflow.
            spin_once();
        }
    }

    /// Attempts to dequeue exactly `dst.len()` bytes into `dst`.
    ///
    /// Lock-free; same claim/retry structure as the enqueue path.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Underflow`] if the head slot holds no committed
    /// data or `dst.len()` exceeds the committed payload observed at the
    /// failed attempt; the ring is unchanged.
    pub fn try_bulk_dequeue(&self, dst: &mut [u8]) -> Result<(), RingError> {
        if dst.is_empty() {
            return Ok(());
        }
        let len = dst.len() as u64;

        loop {
            let pos = self.dequeue.pos.load(Ordering::Relaxed);
            let seq = self.sequence[(pos & self.mask) as usize].load(Ordering::Acquire);
            let diff = seq as i64 - (pos + 1) as i64;

            let available = self.enqueue.pos.load(Ordering::Relaxed) as i64 - pos as i64;

            if diff == 0 && len as i64 <= available {
                if self
                    .dequeue
                    .pos
                    .compare_exchange_weak(pos, pos + len, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    // SAFETY: The CAS claimed [pos, pos + len) exclusively.
                    unsafe { self.read_range(pos, dst) };
                    return Ok(());
                }
            } else if diff < 0 || len as i64 > available {
                // Head slot not committed, or the request reaches past the
                // committed payload: claiming would let the dequeue position
                // overtake the enqueue position.
                let available = available.max(0) as usize;
                trace::warn!(requested = dst.len(), available, "bulk dequeue underflow");
                return Err(RingError::Underflow {
                    requested: dst.len(),
                    available,
                });
            }
            spin_once();
        }
    }

    /// Fixed-length enqueue entry point.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::LengthMismatch`] if `src.len() != N`, otherwise
    /// as [`try_bulk_enqueue`](Self::try_bulk_enqueue).
    #[inline]
    pub fn try_bulk_enqueue_fixed<const N: usize>(&self, src: &[u8]) -> Result<(), RingError> {
        if src.len() != N {
            return Err(RingError::LengthMismatch {
                expected: N,
                actual: src.len(),
            });
        }
        self.try_bulk_enqueue(src)
    }

    /// Fixed-length dequeue entry point.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::LengthMismatch`] if `dst.len() != N`, otherwise
    /// as [`try_bulk_dequeue`](Self::try_bulk_dequeue).
    #[inline]
    pub fn try_bulk_dequeue_fixed<const N: usize>(&self, dst: &mut [u8]) -> Result<(), RingError> {
        if dst.len() != N {
            return Err(RingError::LengthMismatch {
                expected: N,
                actual: dst.len(),
            });
        }
        self.try_bulk_dequeue(dst)
    }

    /// Writes a claimed range, slot by slot.
    ///
    /// # Safety
    ///
    /// `[pos, pos + src.len())` must have been claimed by a successful CAS on
    /// the enqueue position, and this call must be the claim's only writer.
    unsafe fn write_range(&self, pos: u64, src: &[u8]) {
        for (i, &byte) in src.iter().enumerate() {
            let p = pos + i as u64;
            let idx = (p & self.mask) as usize;
            let seq = &self.sequence[idx];

            // Wait for the previous round's consumer to release the slot.
            while seq.load(Ordering::Acquire) != p {
                hint::spin_loop();
            }

            // SAFETY: `seq == p` makes this the slot's sole writer until the
            // publish below hands it to the consumer at `p + 1`.
            unsafe { *self.buffer[idx].get() = byte };
            seq.store(p + 1, Ordering::Release);
        }
    }

    /// Reads a claimed range, slot by slot.
    ///
    /// # Safety
    ///
    /// `[pos, pos + dst.len())` must have been claimed by a successful CAS on
    /// the dequeue position, and this call must be the claim's only reader.
    unsafe fn read_range(&self, pos: u64, dst: &mut [u8]) {
        let size = self.buffer.len() as u64;
        for (i, byte) in dst.iter_mut().enumerate() {
            let p = pos + i as u64;
            let idx = (p & self.mask) as usize;
            let seq = &self.sequence[idx];

            // Wait for the producer of this position to publish its byte.
            while seq.load(Ordering::Acquire) != p + 1 {
                hint::spin_loop();
            }

            // SAFETY: The Acquire load above synchronizes with the producer's
            // Release publish, so the byte is initialized and visible.
            *byte = unsafe { *self.buffer[idx].get() };
            // Stamp the slot with its next producer turn.
            seq.store(p + size, Ordering::Release);
        }
    }

    /// Discards all buffered bytes. Inspection-only: requires quiescence,
    /// which the `&mut` receiver enforces.
    pub fn clear(&mut self) {
        let count = self.count();
        self.clear_n(count);
    }

    /// Discards up to `n` buffered bytes from the head, restamping the
    /// released slots so the producer protocol stays consistent.
    ///
    /// `n` is truncated to the current count. Buffer bytes are not scrubbed.
    pub fn clear_n(&mut self, n: usize) {
        let size = self.buffer.len() as u64;
        let pos = *self.dequeue.pos.get_mut();
        let count = *self.enqueue.pos.get_mut() - pos;
        let n = (n as u64).min(count);

        for i in 0..n {
            let p = pos + i;
            let idx = (p & self.mask) as usize;
            *self.sequence[idx].get_mut() = p + size;
        }
        *self.dequeue.pos.get_mut() = pos + n;
    }

    /// Two-segment view of `length` live bytes starting `start` bytes past
    /// the head. Inspection-only.
    ///
    /// # Panics
    ///
    /// Panics if `start + length` exceeds the buffered count.
    #[must_use]
    pub fn slice(&mut self, start: usize, length: usize) -> SliceView<'_> {
        let count = *self.enqueue.pos.get_mut() - *self.dequeue.pos.get_mut();
        assert!(
            (start + length) as u64 <= count,
            "slice range [{start}, {}) exceeds buffered count {count}",
            start + length,
        );

        let size = self.buffer.len();
        let idx = ((*self.dequeue.pos.get_mut() + start as u64) & self.mask) as usize;

        // SAFETY: UnsafeCell<u8> has the layout of u8, the exclusive borrow
        // rules out concurrent writers, and every byte in the live range was
        // initialized by its producer.
        let bytes: &[u8] =
            unsafe { slice::from_raw_parts(self.buffer.as_ptr().cast::<u8>(), size) };

        if idx + length <= size {
            SliceView::new(&bytes[idx..idx + length], &[])
        } else {
            let head = size - idx;
            SliceView::new(&bytes[idx..], &bytes[..length - head])
        }
    }

    /// View of the live payload from `start` to the tail. Inspection-only.
    ///
    /// # Panics
    ///
    /// Panics if `start` exceeds the buffered count.
    #[must_use]
    pub fn slice_from(&mut self, start: usize) -> SliceView<'_> {
        let count = self.count();
        self.slice(start, count - start)
    }

    /// Byte at logical offset `index` from the head. Inspection-only.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not within the buffered count.
    #[must_use]
    pub fn value_at(&mut self, index: usize) -> u8 {
        let count = self.count();
        assert!(index < count, "index {index} out of buffered count {count}");
        let idx = ((*self.dequeue.pos.get_mut() + index as u64) & self.mask) as usize;
        // SAFETY: Exclusive borrow; the slot is within the live range.
        unsafe { *self.buffer[idx].get() }
    }

    /// Byte at the head of the live payload. Inspection-only.
    ///
    /// # Panics
    ///
    /// Panics if the ring is empty.
    #[must_use]
    pub fn head_value(&mut self) -> u8 {
        self.value_at(0)
    }
}
