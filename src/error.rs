//! Errors reported by ring buffer operations.

use thiserror::Error;

/// Errors that can occur during bulk enqueue/dequeue.
///
/// Nothing here is fatal and nothing is retried automatically: a failed bulk
/// operation leaves the ring untouched and the caller decides what to do.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// A bulk enqueue would exceed the free capacity.
    #[error("bulk enqueue of {requested} bytes exceeds free capacity ({free} bytes)")]
    Overflow {
        /// Bytes the caller tried to enqueue.
        requested: usize,
        /// Free capacity observed at the failed attempt.
        free: usize,
    },
    /// A bulk dequeue would exceed the buffered payload.
    #[error("bulk dequeue of {requested} bytes exceeds buffered data ({available} bytes)")]
    Underflow {
        /// Bytes the caller tried to dequeue.
        requested: usize,
        /// Buffered bytes observed at the failed attempt.
        available: usize,
    },
    /// A fixed-length entry point was called with a span of the wrong length.
    #[error("fixed-length operation expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Length the entry point is specialized for.
        expected: usize,
        /// Length the caller actually passed.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RingError::Overflow {
            requested: 9,
            free: 4,
        };
        assert_eq!(
            format!("{err}"),
            "bulk enqueue of 9 bytes exceeds free capacity (4 bytes)"
        );

        let err = RingError::LengthMismatch {
            expected: 8,
            actual: 7,
        };
        assert_eq!(
            format!("{err}"),
            "fixed-length operation expected 8 bytes, got 7"
        );
    }
}
