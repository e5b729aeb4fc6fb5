//! Bounded byte ring buffers for streaming binary payloads.
//!
//! Two variants share one contract: bulk byte enqueue/dequeue committed
//! all-or-nothing, a zero-copy two-segment slice view, and power-of-two
//! capacity fixed at construction.
//!
//! - [`SerialRingBuffer`]: single-threaded, no synchronization; serial
//!   access is enforced by `&mut self`.
//! - [`ConcurrentRingBuffer`]: lock-free MPMC (Vyukov's bounded queue
//!   adapted to bulk byte ranges); bulk operations are linearizable at a
//!   single position CAS.
//!
//! The [`ffi`] module exposes the serial variant over a flat C ABI; the
//! crate builds as both `rlib` and `cdylib` for that purpose.
//!
//! # Example
//!
//! ```
//! use scatter::SerialRingBuffer;
//!
//! let mut ring = SerialRingBuffer::new(8);
//! ring.try_bulk_enqueue(&[1, 2, 3, 4]).unwrap();
//!
//! let mut dst = [0u8; 4];
//! ring.try_bulk_dequeue(&mut dst).unwrap();
//! assert_eq!(dst, [1, 2, 3, 4]);
//! ```

pub mod concurrent;
pub mod error;
pub mod ffi;
pub mod serial;
pub mod span;

mod trace;

pub use concurrent::ConcurrentRingBuffer;
pub use error::RingError;
pub use serial::SerialRingBuffer;
pub use span::{ByteSpan, SliceView};
pub use trace::init_tracing;
