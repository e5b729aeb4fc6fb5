//! Single-threaded bounded byte ring buffer.
//!
//! [`SerialRingBuffer`] is the low-overhead variant: no atomics, no
//! synchronization. The caller's guarantee of serial access is expressed
//! through `&mut self` receivers rather than a documented contract, so
//! misuse is a compile error instead of a data race.
//!
//! Bulk operations are all-or-nothing: an enqueue that does not fit, or a
//! dequeue that exceeds the buffered payload, fails without touching state.

use crate::error::RingError;
use crate::span::SliceView;
use crate::trace;

/// Bounded byte ring buffer for serial (single-threaded) use.
///
/// Capacity is rounded up to the next power of two at construction and fixed
/// thereafter. Enqueue and dequeue positions are monotonic `u64` counters;
/// the live payload occupies `[dequeue, enqueue)` and slot `p` lives at
/// `buffer[p & mask]`.
pub struct SerialRingBuffer {
    buffer: Box<[u8]>,
    mask: u64,
    enqueue_pos: u64,
    dequeue_pos: u64,
}

impl SerialRingBuffer {
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
        Self {
            buffer: vec![0u8; size].into_boxed_slice(),
            mask: (size - 1) as u64,
            enqueue_pos: 0,
            dequeue_pos: 0,
        }
    }

    /// Size of the backing buffer (a power of two).
    #[inline]
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Number of buffered bytes.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        (self.enqueue_pos - self.dequeue_pos) as usize
    }

    /// Attempts to enqueue all of `src`.
    ///
    /// The copy is wrap-aware: a range crossing the end of the backing buffer
    /// is written as two contiguous segment copies.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Overflow`] if `src.len()` exceeds the free
    /// capacity; the ring is unchanged.
    #[inline]
    pub fn try_bulk_enqueue(&mut self, src: &[u8]) -> Result<(), RingError> {
        let free = self.buffer.len() - self.count();
        if src.len() > free {
            trace::warn!(requested = src.len(), free, "bulk enqueue overflow");
            return Err(RingError::Overflow {
                requested: src.len(),
                free,
            });
        }

        let pos = self.enqueue_pos;
        let idx = (pos & self.mask) as usize;
        let head = src.len().min(self.buffer.len() - idx);
        self.buffer[idx..idx + head].copy_from_slice(&src[..head]);
        self.buffer[..src.len() - head].copy_from_slice(&src[head..]);

        self.enqueue_pos = pos + src.len() as u64;
        Ok(())
    }

    /// Attempts to dequeue exactly `dst.len()` bytes into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::Underflow`] if `dst.len()` exceeds the buffered
    /// payload; the ring is unchanged.
    #[inline]
    pub fn try_bulk_dequeue(&mut self, dst: &mut [u8]) -> Result<(), RingError> {
        let available = self.count();
        if dst.len() > available {
            trace::warn!(requested = dst.len(), available, "bulk dequeue underflow");
            return Err(RingError::Underflow {
                requested: dst.len(),
                available,
            });
        }

        let len = dst.len();
        let pos = self.dequeue_pos;
        let idx = (pos & self.mask) as usize;
        let head = len.min(self.buffer.len() - idx);
        let (front, back) = dst.split_at_mut(head);
        front.copy_from_slice(&self.buffer[idx..idx + head]);
        back.copy_from_slice(&self.buffer[..len - head]);

        self.dequeue_pos = pos + len as u64;
        Ok(())
    }

    /// Fixed-length enqueue entry point.
    ///
    /// Identical to [`try_bulk_enqueue`](Self::try_bulk_enqueue) except that
    /// a span whose length is not exactly `N` is rejected up front.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::LengthMismatch`] if `src.len() != N`, otherwise
    /// as the general form.
    #[inline]
    pub fn try_bulk_enqueue_fixed<const N: usize>(&mut self, src: &[u8]) -> Result<(), RingError> {
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
    /// as the general form.
    #[inline]
    pub fn try_bulk_dequeue_fixed<const N: usize>(
        &mut self,
        dst: &mut [u8],
    ) -> Result<(), RingError> {
        if dst.len() != N {
            return Err(RingError::LengthMismatch {
                expected: N,
                actual: dst.len(),
            });
        }
        self.try_bulk_dequeue(dst)
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        let count = self.count();
        self.clear_n(count);
    }

    /// Discards up to `n` buffered bytes from the head.
    ///
    /// `n` is truncated to the current count. Buffer bytes are not scrubbed.
    pub fn clear_n(&mut self, n: usize) {
        let n = n.min(self.count());
        self.dequeue_pos += n as u64;
    }

    /// Two-segment view of `length` live bytes starting `start` bytes past
    /// the head.
    ///
    /// `second` is empty unless the range crosses the wrap point.
    ///
    /// # Panics
    ///
    /// Panics if `start + length` exceeds the buffered count.
    #[must_use]
    pub fn slice(&self, start: usize, length: usize) -> SliceView<'_> {
        assert!(
            start + length <= self.count(),
            "slice range [{start}, {}) exceeds buffered count {}",
            start + length,
            self.count()
        );

        let idx = ((self.dequeue_pos + start as u64) & self.mask) as usize;
        if idx + length <= self.buffer.len() {
            SliceView::new(&self.buffer[idx..idx + length], &[])
        } else {
            let head = self.buffer.len() - idx;
            SliceView::new(&self.buffer[idx..], &self.buffer[..length - head])
        }
    }

    /// View of the live payload from `start` to the tail.
    ///
    /// # Panics
    ///
    /// Panics if `start` exceeds the buffered count.
    #[must_use]
    pub fn slice_from(&self, start: usize) -> SliceView<'_> {
        self.slice(start, self.count() - start)
    }
}
