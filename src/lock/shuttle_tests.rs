//! Shuttle randomized-schedule tests for the ascending-order protocol.
//!
//! Shuttle explores thread schedules under its own synchronization
//! primitives, so blocking inside `parking_lot` is invisible to it. These
//! tests therefore model the acquire protocol directly on shuttle's
//! primitives: a table of per-region locks, taken strictly in ascending id
//! order, exactly as `RangeLock` walks its region span. A schedule that
//! could deadlock or break mutual exclusion fails the model.
//!
//! Run with: `cargo test --release --lib lock::shuttle_tests`

use shuttle::sync::{Arc, Mutex, RwLock};
use shuttle::thread;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Regions as a bank of exclusive locks, acquired ascending.
fn lock_span_ascending(regions: &[Mutex<()>], first: usize, last: usize) -> Vec<shuttle::sync::MutexGuard<'_, ()>> {
    (first..=last)
        .map(|id| regions[id].lock().unwrap())
        .collect()
}

/// Two overlapping exclusive spans never deadlock and never share a region.
#[test]
fn test_shuttle_overlapping_exclusive_spans() {
    shuttle::check_random(
        || {
            let regions = Arc::new([Mutex::new(()), Mutex::new(()), Mutex::new(())]);
            let owners = Arc::new([
                AtomicUsize::new(0),
                AtomicUsize::new(0),
                AtomicUsize::new(0),
            ]);

            let spans = [(0usize, 1usize), (1, 2)];
            let handles: Vec<_> = spans
                .into_iter()
                .map(|(first, last)| {
                    let regions = Arc::clone(&regions);
                    let owners = Arc::clone(&owners);

                    thread::spawn(move || {
                        let guards = lock_span_ascending(&regions[..], first, last);

                        // While held, every covered region has exactly one
                        // exclusive owner.
                        for id in first..=last {
                            let prev = owners[id].fetch_add(1, Ordering::SeqCst);
                            assert_eq!(prev, 0, "two exclusive owners on region {id}");
                        }
                        for id in first..=last {
                            owners[id].fetch_sub(1, Ordering::SeqCst);
                        }

                        drop(guards);
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        },
        1000,
    );
}

/// Three threads over pairwise-overlapping spans; ascending order alone
/// must prevent any circular wait.
#[test]
fn test_shuttle_three_way_overlap_no_deadlock() {
    shuttle::check_random(
        || {
            let regions = Arc::new([
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
            ]);

            let spans = [(0usize, 2usize), (1, 3), (0, 3)];
            let handles: Vec<_> = spans
                .into_iter()
                .map(|(first, last)| {
                    let regions = Arc::clone(&regions);
                    thread::spawn(move || {
                        let guards = lock_span_ascending(&regions[..], first, last);
                        drop(guards);
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        },
        1000,
    );
}

/// Shared holders coexist on a region; an exclusive holder never overlaps
/// a reader.
#[test]
fn test_shuttle_shared_vs_exclusive() {
    shuttle::check_random(
        || {
            let region = Arc::new(RwLock::new(()));
            let writers = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();

            for _ in 0..2 {
                let region = Arc::clone(&region);
                let writers = Arc::clone(&writers);
                handles.push(thread::spawn(move || {
                    let guard = region.read().unwrap();
                    assert_eq!(
                        writers.load(Ordering::SeqCst),
                        0,
                        "reader overlapped a writer"
                    );
                    drop(guard);
                }));
            }

            {
                let region = Arc::clone(&region);
                let writers = Arc::clone(&writers);
                handles.push(thread::spawn(move || {
                    let guard = region.write().unwrap();
                    writers.fetch_add(1, Ordering::SeqCst);
                    writers.fetch_sub(1, Ordering::SeqCst);
                    drop(guard);
                }));
            }

            for h in handles {
                h.join().unwrap();
            }
        },
        1000,
    );
}
