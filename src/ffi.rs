//! C-compatible façade over the serial ring buffer.
//!
//! One symbol per operation, flat ABI, raw pointer+length spans. Handles are
//! heap-allocated [`SerialRingBuffer`]s; `create_ring_buffer` and
//! `release_ring_buffer` bracket the lifetime, every other call borrows.
//!
//! All entry points are NULL-tolerant and never unwind across the ABI:
//! failures surface as `false`, `0`, or a NULL handle.

use std::ptr;

use crate::serial::SerialRingBuffer;
use crate::span::ByteSpan;

/// Allocates a serial ring buffer with at least `capacity` bytes.
///
/// Returns NULL if `capacity == 0`. The handle must be released with
/// [`release_ring_buffer`].
#[unsafe(no_mangle)]
pub extern "C" fn create_ring_buffer(capacity: usize) -> *mut SerialRingBuffer {
    if capacity == 0 {
        return ptr::null_mut();
    }
    Box::into_raw(Box::new(SerialRingBuffer::new(capacity)))
}

/// Releases a ring buffer created by [`create_ring_buffer`].
///
/// NULL is ignored. Passing the same handle twice is undefined behavior.
#[unsafe(no_mangle)]
pub extern "C" fn release_ring_buffer(ring: *mut SerialRingBuffer) {
    if ring.is_null() {
        return;
    }
    // SAFETY: The handle came from Box::into_raw in create_ring_buffer and
    // has not been released before.
    drop(unsafe { Box::from_raw(ring) });
}

/// Returns the backing buffer size (a power of two), or 0 for NULL.
#[unsafe(no_mangle)]
pub extern "C" fn ring_buffer_get_buffer_size(ring: *const SerialRingBuffer) -> usize {
    if ring.is_null() {
        return 0;
    }
    // SAFETY: Valid handle per the create/release contract.
    unsafe { &*ring }.buffer_size()
}

/// Returns the number of buffered bytes, or 0 for NULL.
#[unsafe(no_mangle)]
pub extern "C" fn ring_buffer_get_count(ring: *const SerialRingBuffer) -> usize {
    if ring.is_null() {
        return 0;
    }
    // SAFETY: Valid handle per the create/release contract.
    unsafe { &*ring }.count()
}

/// Enqueues `len` bytes from `data`. Returns `false` on overflow or invalid
/// arguments; the ring is unchanged on failure.
#[unsafe(no_mangle)]
pub extern "C" fn ring_buffer_try_bulk_enqueue(
    ring: *mut SerialRingBuffer,
    data: *const u8,
    len: usize,
) -> bool {
    if ring.is_null() || (data.is_null() && len > 0) {
        return false;
    }
    let span = ByteSpan::new(data.cast_mut(), len);
    // SAFETY: Valid handle; the caller guarantees `data` spans `len` live
    // bytes for the duration of the call.
    let ring = unsafe { &mut *ring };
    let src = unsafe { span.as_slice() };
    ring.try_bulk_enqueue(src).is_ok()
}

/// Dequeues exactly `len` bytes into `data`. Returns `false` on underflow or
/// invalid arguments; the ring is unchanged on failure.
#[unsafe(no_mangle)]
pub extern "C" fn ring_buffer_try_bulk_dequeue(
    ring: *mut SerialRingBuffer,
    data: *mut u8,
    len: usize,
) -> bool {
    if ring.is_null() || (data.is_null() && len > 0) {
        return false;
    }
    let span = ByteSpan::new(data, len);
    // SAFETY: Valid handle; the caller guarantees `data` spans `len` writable
    // bytes for the duration of the call.
    let ring = unsafe { &mut *ring };
    let dst = unsafe { span.as_mut_slice() };
    ring.try_bulk_dequeue(dst).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_enqueue_dequeue_release() {
        let ring = create_ring_buffer(5);
        assert!(!ring.is_null());
        assert_eq!(ring_buffer_get_buffer_size(ring), 8);
        assert_eq!(ring_buffer_get_count(ring), 0);

        let src = [1u8, 2, 3, 4];
        assert!(ring_buffer_try_bulk_enqueue(ring, src.as_ptr(), src.len()));
        assert_eq!(ring_buffer_get_count(ring), 4);

        let mut dst = [0u8; 4];
        assert!(ring_buffer_try_bulk_dequeue(ring, dst.as_mut_ptr(), dst.len()));
        assert_eq!(dst, [1, 2, 3, 4]);
        assert_eq!(ring_buffer_get_count(ring), 0);

        release_ring_buffer(ring);
    }

    #[test]
    fn overflow_and_underflow_report_false() {
        let ring = create_ring_buffer(4);

        let full = [0u8; 4];
        assert!(ring_buffer_try_bulk_enqueue(ring, full.as_ptr(), full.len()));
        let one = [9u8];
        assert!(!ring_buffer_try_bulk_enqueue(ring, one.as_ptr(), 1));
        assert_eq!(ring_buffer_get_count(ring), 4);

        let mut dst = [0u8; 5];
        assert!(!ring_buffer_try_bulk_dequeue(ring, dst.as_mut_ptr(), dst.len()));
        assert_eq!(ring_buffer_get_count(ring), 4);

        release_ring_buffer(ring);
    }

    #[test]
    fn null_and_zero_edges() {
        assert!(create_ring_buffer(0).is_null());
        release_ring_buffer(ptr::null_mut());

        assert_eq!(ring_buffer_get_buffer_size(ptr::null()), 0);
        assert_eq!(ring_buffer_get_count(ptr::null()), 0);
        assert!(!ring_buffer_try_bulk_enqueue(ptr::null_mut(), ptr::null(), 0));

        let ring = create_ring_buffer(8);
        // NULL data with a non-zero length is rejected.
        assert!(!ring_buffer_try_bulk_enqueue(ring, ptr::null(), 4));
        // A zero-length span enqueues nothing and succeeds.
        assert!(ring_buffer_try_bulk_enqueue(ring, ptr::null(), 0));
        assert_eq!(ring_buffer_get_count(ring), 0);
        release_ring_buffer(ring);
    }
}
