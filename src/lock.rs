//! The range-lock facade.
//!
//! [`RangeLock`] translates a byte range into its covered region ids and
//! drives acquire/release against the region table. Multi-region requests
//! always walk ids in ascending numeric order — on acquire, on release, and
//! on the rollback path of the `try_` variants — which is the whole
//! deadlock-avoidance story: overlapping spans can never wait on each other
//! in a cycle.

use crate::error::ConfigError;
use crate::region::{self, RegionId};
use crate::table::RegionTable;
use crate::trace::debug_log;

#[cfg(test)]
mod shuttle_tests;

// ============================================================================
//  Mode
// ============================================================================

/// Which side of the readers-writer lock a request takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Exclusive,
    Shared,
}

// ============================================================================
//  RangeLock
// ============================================================================

/// Byte-range lock over a shared resource.
///
/// Divides the resource into fixed power-of-two regions and locks exactly
/// the regions a request touches. Region state is created on first use and
/// dropped with its last reference, so a quiescent `RangeLock` holds no
/// per-region memory at all.
///
/// The lock never reads or writes resource content; callers own the actual
/// I/O and use this purely to serialize it.
///
/// # Example
///
/// ```rust
/// use rangelock::RangeLock;
///
/// let lock = RangeLock::with_region_size(1024).unwrap();
///
/// lock.lock(0, 2048); // covers regions 0 and 1
/// assert!(!lock.try_lock(512, 100)); // overlaps region 0
/// lock.unlock(0, 2048);
/// assert!(lock.try_lock(512, 100));
/// lock.unlock(512, 100);
/// ```
#[derive(Debug)]
pub struct RangeLock {
    /// Power-of-two region size, fixed for the lifetime of the instance.
    region_size: u64,

    /// Live per-region state, keyed by region id.
    table: RegionTable,
}

// The region table holds a `parking_lot::Mutex`, which is not `PartialEq`, so
// `RangeLock` cannot derive it. Compare by configuration (`region_size`), which
// is all that identifies a lock's construction parameters.
impl PartialEq for RangeLock {
    fn eq(&self, other: &Self) -> bool {
        self.region_size == other.region_size
    }
}

impl RangeLock {
    /// Create a lock for a resource of `resource_size` bytes, with the
    /// region size chosen by [`region::granularity_for`]: larger resources
    /// get proportionally coarser regions, floored at 1 KiB.
    ///
    /// ```rust
    /// use rangelock::RangeLock;
    ///
    /// assert_eq!(RangeLock::new(1 << 30).region_size(), 32768);
    /// ```
    #[must_use]
    pub fn new(resource_size: u64) -> Self {
        Self {
            region_size: region::granularity_for(resource_size),
            table: RegionTable::new(),
        }
    }

    /// Create a lock with an explicit region size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `region_size` is zero or not a power of
    /// two; no instance is created.
    pub fn with_region_size(region_size: u64) -> Result<Self, ConfigError> {
        if region_size == 0 {
            return Err(ConfigError::ZeroRegionSize);
        }
        if !region_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo(region_size));
        }

        Ok(Self {
            region_size,
            table: RegionTable::new(),
        })
    }

    /// The region size in bytes.
    #[inline]
    #[must_use]
    pub const fn region_size(&self) -> u64 {
        self.region_size
    }

    /// Number of regions with live lock state.
    ///
    /// Diagnostic accessor: with no outstanding holds this reports zero,
    /// since region state is dropped with its last reference.
    #[must_use]
    pub fn active_regions(&self) -> usize {
        self.table.active_regions()
    }

    // ========================================================================
    //  Exclusive
    // ========================================================================

    /// Lock `[offset, offset + length)` for exclusive ownership, blocking
    /// until every covered region is held.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`,
    /// before any region is touched.
    pub fn lock(&self, offset: u64, length: u64) {
        self.lock_range(offset, length, Mode::Exclusive);
    }

    /// Release an exclusive hold over `[offset, offset + length)`.
    ///
    /// Must pair with an earlier [`lock`](Self::lock) of the same range by
    /// the same logical caller.
    ///
    /// # Panics
    ///
    /// Panics on an invalid range, or if any covered region is not
    /// currently held (double unlock, mismatched range).
    pub fn unlock(&self, offset: u64, length: u64) {
        self.unlock_range(offset, length, Mode::Exclusive);
    }

    /// Attempt to lock `[offset, offset + length)` exclusively without
    /// blocking.
    ///
    /// All-or-nothing: on the first contended region, every region taken by
    /// this call is released again (in ascending id order) and `false` is
    /// returned with no residual state. `false` is a normal outcome, not an
    /// error.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`.
    #[must_use]
    pub fn try_lock(&self, offset: u64, length: u64) -> bool {
        self.try_lock_range(offset, length, Mode::Exclusive)
    }

    // ========================================================================
    //  Shared
    // ========================================================================

    /// Lock `[offset, offset + length)` for shared ownership, blocking
    /// until every covered region admits a reader.
    ///
    /// Any number of shared holders may overlap; none may overlap an
    /// exclusive holder.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`.
    pub fn lock_shared(&self, offset: u64, length: u64) {
        self.lock_range(offset, length, Mode::Shared);
    }

    /// Release a shared hold over `[offset, offset + length)`.
    ///
    /// Must pair with an earlier [`lock_shared`](Self::lock_shared) of the
    /// same range by the same logical caller.
    ///
    /// # Panics
    ///
    /// Panics on an invalid range, or if any covered region is not
    /// currently held.
    pub fn unlock_shared(&self, offset: u64, length: u64) {
        self.unlock_range(offset, length, Mode::Shared);
    }

    /// Attempt a shared lock of `[offset, offset + length)` without
    /// blocking. All-or-nothing, like [`try_lock`](Self::try_lock).
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`.
    #[must_use]
    pub fn try_lock_shared(&self, offset: u64, length: u64) -> bool {
        self.try_lock_range(offset, length, Mode::Shared)
    }

    // ========================================================================
    //  Scoped
    // ========================================================================

    /// Run `op` with `[offset, offset + length)` locked exclusively.
    ///
    /// The range is released on every exit path — normal return, an `Err`
    /// returned by `op`, or a panic unwinding out of `op` — so a failing
    /// body never leaks a held region.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`.
    pub fn with_lock<R>(&self, offset: u64, length: u64, op: impl FnOnce() -> R) -> R {
        self.lock(offset, length);
        let _release = UnlockOnDrop {
            lock: self,
            offset,
            length,
            mode: Mode::Exclusive,
        };

        op()
    }

    /// Run `op` with `[offset, offset + length)` locked in shared mode.
    /// Release semantics match [`with_lock`](Self::with_lock).
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero or `offset + length` overflows `u64`.
    pub fn with_lock_shared<R>(&self, offset: u64, length: u64, op: impl FnOnce() -> R) -> R {
        self.lock_shared(offset, length);
        let _release = UnlockOnDrop {
            lock: self,
            offset,
            length,
            mode: Mode::Shared,
        };

        op()
    }

    // ========================================================================
    //  Per-region loops
    // ========================================================================

    /// Acquire every covered region in ascending id order, blocking on each
    /// region's lock in turn.
    fn lock_range(&self, offset: u64, length: u64, mode: Mode) {
        for id in region::region_span(offset, length, self.region_size) {
            let entry = self.table.acquire(id);
            match mode {
                Mode::Exclusive => entry.lock_exclusive(),
                Mode::Shared => entry.lock_shared(),
            }
        }

        debug_log!(offset, length, ?mode, "range locked");
    }

    /// Release every covered region in the same ascending id order.
    fn unlock_range(&self, offset: u64, length: u64, mode: Mode) {
        for id in region::region_span(offset, length, self.region_size) {
            let entry = self.table.lookup_held(id);

            // SAFETY: lookup_held verified the region is referenced, and
            // the unlock contract requires this caller to have locked it
            // in `mode` earlier.
            unsafe {
                match mode {
                    Mode::Exclusive => entry.unlock_exclusive(),
                    Mode::Shared => entry.unlock_shared(),
                }
            }

            self.table.release(id);
        }

        debug_log!(offset, length, ?mode, "range unlocked");
    }

    /// Attempt every covered region in ascending id order; on the first
    /// refusal, undo everything this call did and report failure.
    fn try_lock_range(&self, offset: u64, length: u64, mode: Mode) -> bool {
        let span = region::region_span(offset, length, self.region_size);
        let first = *span.start();

        for id in span {
            let entry = self.table.acquire(id);

            let taken = match mode {
                Mode::Exclusive => entry.try_lock_exclusive(),
                Mode::Shared => entry.try_lock_shared(),
            };

            if !taken {
                // The failed region was referenced but never locked; drop
                // that reference, then unwind the regions already held.
                self.table.release(id);
                self.rollback(first, id, mode);

                debug_log!(offset, length, ?mode, contended = id, "try-lock failed");
                return false;
            }
        }

        debug_log!(offset, length, ?mode, "try-lock succeeded");
        true
    }

    /// Release regions `first..failed` taken by a partially successful
    /// try-lock, in the same ascending order as every other traversal.
    fn rollback(&self, first: RegionId, failed: RegionId, mode: Mode) {
        for id in first..failed {
            let entry = self.table.lookup_held(id);

            // SAFETY: this call locked `id` in `mode` moments ago and has
            // not released it.
            unsafe {
                match mode {
                    Mode::Exclusive => entry.unlock_exclusive(),
                    Mode::Shared => entry.unlock_shared(),
                }
            }

            self.table.release(id);
        }
    }
}

// ============================================================================
//  UnlockOnDrop
// ============================================================================

/// Releases a held range when dropped, including during unwinding, so the
/// scoped helpers cannot leak a region whatever the body does.
struct UnlockOnDrop<'a> {
    lock: &'a RangeLock,
    offset: u64,
    length: u64,
    mode: Mode,
}

impl Drop for UnlockOnDrop<'_> {
    fn drop(&mut self) {
        self.lock.unlock_range(self.offset, self.length, self.mode);
    }
}

// ============================================================================
//  Tests
// ============================================================================
