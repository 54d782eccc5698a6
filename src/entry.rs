//! Per-region lock state.
//!
//! A [`RegionEntry`] pairs a reference count with a readers-writer lock.
//! Entries live in the region table only while referenced: the first
//! `acquire` of a region creates its entry, and the `release` that drops the
//! refcount to zero erases it. The refcount is mutated exclusively under the
//! table's mutex; the readers-writer lock is what callers actually block on,
//! held with the table mutex long gone.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RawRwLock;
use parking_lot::lock_api::RawRwLock as _;

/// Lock state for one region.
///
/// Fairness between shared and exclusive waiters is whatever
/// [`parking_lot`]'s policy provides; it is implementation-defined, not part
/// of this crate's contract.
pub(crate) struct RegionEntry {
    /// Outstanding acquire references across all callers, shared or
    /// exclusive.
    ///
    /// Only read and written while the region table's mutex is held, so
    /// Relaxed ordering suffices; the mutex provides the synchronization.
    /// Atomic (rather than a plain field) because entries are shared
    /// through `Arc` while callers block on `rw` outside the mutex.
    refcount: AtomicU64,

    /// The region's readers-writer lock: one exclusive holder, or any
    /// number of shared holders.
    rw: RawRwLock,
}

impl RegionEntry {
    pub(crate) const fn new() -> Self {
        Self {
            refcount: AtomicU64::new(0),
            rw: RawRwLock::INIT,
        }
    }

    /// Increment the refcount. Table mutex must be held.
    #[inline]
    pub(crate) fn ref_inc(&self) -> u64 {
        self.refcount.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the refcount, returning the new count. Table mutex must be
    /// held.
    #[inline]
    pub(crate) fn ref_dec(&self) -> u64 {
        let prev = self.refcount.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "refcount underflow");

        prev - 1
    }

    /// Current refcount. Table mutex must be held for a meaningful answer.
    #[inline]
    pub(crate) fn refs(&self) -> u64 {
        self.refcount.load(Ordering::Relaxed)
    }

    /// Block until the region can be held exclusively.
    #[inline]
    pub(crate) fn lock_exclusive(&self) {
        self.rw.lock_exclusive();
    }

    /// Attempt an exclusive hold without blocking.
    #[inline]
    #[must_use]
    pub(crate) fn try_lock_exclusive(&self) -> bool {
        self.rw.try_lock_exclusive()
    }

    /// Release an exclusive hold.
    ///
    /// # Safety
    ///
    /// Must pair with a prior successful [`lock_exclusive`](Self::lock_exclusive)
    /// or [`try_lock_exclusive`](Self::try_lock_exclusive) by the same
    /// logical caller.
    #[inline]
    pub(crate) unsafe fn unlock_exclusive(&self) {
        // SAFETY: forwarded caller contract above.
        unsafe { self.rw.unlock_exclusive() }
    }

    /// Block until the region can be held in shared mode.
    #[inline]
    pub(crate) fn lock_shared(&self) {
        self.rw.lock_shared();
    }

    /// Attempt a shared hold without blocking.
    #[inline]
    #[must_use]
    pub(crate) fn try_lock_shared(&self) -> bool {
        self.rw.try_lock_shared()
    }

    /// Release a shared hold.
    ///
    /// # Safety
    ///
    /// Must pair with a prior successful [`lock_shared`](Self::lock_shared)
    /// or [`try_lock_shared`](Self::try_lock_shared) by the same logical
    /// caller.
    #[inline]
    pub(crate) unsafe fn unlock_shared(&self) {
        // SAFETY: forwarded caller contract above.
        unsafe { self.rw.unlock_shared() }
    }
}

impl std::fmt::Debug for RegionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionEntry")
            .field("refcount", &self.refs())
            .field("locked", &self.rw.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_roundtrip() {
        let entry = RegionEntry::new();
        assert_eq!(entry.refs(), 0);

        assert_eq!(entry.ref_inc(), 1);
        assert_eq!(entry.ref_inc(), 2);
        assert_eq!(entry.ref_dec(), 1);
        assert_eq!(entry.ref_dec(), 0);
    }

    #[test]
    fn test_exclusive_excludes_everything() {
        let entry = RegionEntry::new();
        entry.lock_exclusive();

        assert!(!entry.try_lock_exclusive());
        assert!(!entry.try_lock_shared());

        // SAFETY: paired with lock_exclusive above.
        unsafe { entry.unlock_exclusive() };

        assert!(entry.try_lock_exclusive());
        // SAFETY: paired with the successful try_lock_exclusive.
        unsafe { entry.unlock_exclusive() };
    }

    #[test]
    fn test_shared_holders_coexist() {
        let entry = RegionEntry::new();
        entry.lock_shared();

        assert!(entry.try_lock_shared());
        assert!(!entry.try_lock_exclusive());

        // SAFETY: paired with the two shared holds above.
        unsafe {
            entry.unlock_shared();
            entry.unlock_shared();
        }

        assert!(entry.try_lock_exclusive());
        // SAFETY: paired with the successful try_lock_exclusive.
        unsafe { entry.unlock_exclusive() };
    }
}
