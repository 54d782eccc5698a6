//! # `rangelock`
//!
//! Byte-range locking over a shared resource.
//!
//! A [`RangeLock`] serializes access to sub-ranges of a shared resource (a
//! file, a buffer, any addressable region) without locking the whole
//! resource. The resource is divided into fixed power-of-two *regions*;
//! a lock request covers every region its byte range touches. Region state
//! is created lazily on first use and dropped as soon as the last reference
//! goes away, so memory cost tracks the ranges currently held, not the
//! resource size.
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `lock` / `unlock` | Exclusive hold over `[offset, offset + length)`, blocking |
//! | `lock_shared` / `unlock_shared` | Shared hold, many concurrent readers |
//! | `try_lock` / `try_lock_shared` | Non-blocking; all-or-nothing on failure |
//! | `with_lock` / `with_lock_shared` | Scoped hold, released on every exit path |
//!
//! ## Thread Safety
//!
//! `RangeLock` is `Send + Sync`; share one instance (by reference or `Arc`)
//! across all threads touching the resource:
//!
//! ```rust
//! use rangelock::RangeLock;
//!
//! let lock = RangeLock::new(1 << 20);
//!
//! lock.lock(0, 4096);
//! // ... exclusive access to bytes [0, 4096) ...
//! lock.unlock(0, 4096);
//!
//! lock.with_lock_shared(4096, 512, || {
//!     // ... read bytes [4096, 4608) alongside other readers ...
//! });
//! ```
//!
//! ## Deadlock Avoidance
//!
//! A request covering several regions locks them strictly in ascending
//! region-id order, and releases them in that same order. Two requests over
//! overlapping multi-region spans therefore never form a circular wait.
//!
//! ## Not Reentrant
//!
//! A second acquisition of an already-held range by the same logical caller
//! is not supported: exclusive-on-exclusive self-deadlocks, and
//! shared-on-shared double-counts (requiring a matching double release).
//!
//! ## Constraints
//!
//! - Region sizes must be non-zero powers of two.
//! - `length` must be non-zero and `offset + length` must not overflow `u64`;
//!   violations panic before any region is touched.
//! - Every `unlock` must pair with an earlier `lock` over the same range;
//!   a mismatch panics rather than corrupt shared refcount state.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod lock;
pub mod region;

mod entry;
mod table;
mod trace;

pub use error::ConfigError;
pub use lock::RangeLock;
pub use region::RegionId;
