//! Range-Lock Contention Profiling Binary
//!
//! Profiles lock/unlock latency under configurable overlap to identify
//! slow-path outliers (table contention vs region contention). When tracing
//! is enabled, per-range events are written to a JSON log.
//!
//! Run with:
//! ```bash
//! # Without tracing (fast, just stats)
//! cargo run --release --bin range_contention
//!
//! # With tracing (writes to logs/range_contention.json)
//! RUST_LOG=rangelock=debug cargo run --release --features tracing --bin range_contention
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rangelock::RangeLock;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_thread_ids(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    println!("Tracing enabled (RUST_LOG filter applies)");
}

#[cfg(not(feature = "tracing"))]
fn init_tracing() {
    println!("Tracing disabled (compile with --features tracing)");
}

// =============================================================================
// Operation Stats (Thread-Local + Aggregation)
// =============================================================================

/// Per-thread operation timing statistics.
#[derive(Default)]
struct ThreadOpStats {
    /// Longest lock+unlock cycle observed.
    max_op_ns: u64,

    /// Number of slow ops (>1ms).
    slow_ops_1ms: u64,

    /// Number of very slow ops (>10ms).
    slow_ops_10ms: u64,
}

impl ThreadOpStats {
    const fn record_op(&mut self, op_ns: u64) {
        if op_ns > self.max_op_ns {
            self.max_op_ns = op_ns;
        }

        if op_ns > 1_000_000 {
            self.slow_ops_1ms += 1;
        }

        if op_ns > 10_000_000 {
            self.slow_ops_10ms += 1;
        }
    }

    const fn merge(&mut self, other: &Self) {
        if other.max_op_ns > self.max_op_ns {
            self.max_op_ns = other.max_op_ns;
        }

        self.slow_ops_1ms += other.slow_ops_1ms;
        self.slow_ops_10ms += other.slow_ops_10ms;
    }
}

// =============================================================================
// Benchmark Runner
// =============================================================================

struct RunConfig {
    threads: u64,
    ops_per_thread: u64,

    /// Number of distinct regions the random ranges are drawn from.
    /// Smaller means hotter: 1 degenerates to a single mutex.
    spread_regions: u64,
}

/// Deterministic 64-bit mixer, so runs are reproducible.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^ (x >> 33)
}

fn run_benchmark(config: &RunConfig) -> (Duration, ThreadOpStats) {
    let region_size = 1024u64;
    let lock = Arc::new(RangeLock::with_region_size(region_size).unwrap());

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let lock = Arc::clone(&lock);
            let ops = config.ops_per_thread;
            let spread = config.spread_regions;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();

                for i in 0..ops {
                    let seed = t * ops + i;
                    let offset = (mix(seed) % spread) * region_size;
                    let length = 1 + mix(seed.wrapping_add(1)) % (2 * region_size);

                    let op_start = Instant::now();
                    if i % 4 == 0 {
                        lock.lock_shared(offset, length);
                        lock.unlock_shared(offset, length);
                    } else {
                        lock.lock(offset, length);
                        lock.unlock(offset, length);
                    }
                    let op_elapsed = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_elapsed);

                    if op_elapsed > 10_000_000 {
                        eprintln!(
                            "[T{t:02}] SLOW_OP: i={i} offset={offset} took {:.2}ms",
                            op_elapsed as f64 / 1_000_000.0
                        );
                    }
                }

                stats
            })
        })
        .collect();

    let mut merged = ThreadOpStats::default();
    for h in handles {
        let thread_stats = h.join().unwrap();
        merged.merge(&thread_stats);
    }

    assert_eq!(lock.active_regions(), 0, "region table did not drain");

    (start.elapsed(), merged)
}

fn print_stats(config: &RunConfig, elapsed: Duration, stats: &ThreadOpStats) {
    let total_ops = config.threads * config.ops_per_thread;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("\n{}", "=".repeat(72));
    println!(
        "RESULTS: {} threads x {} ops, {} hot regions",
        config.threads, config.ops_per_thread, config.spread_regions
    );
    println!("{}", "=".repeat(72));

    println!("Elapsed:     {elapsed:?}");
    println!("Throughput:  {ops_per_sec:.0} ops/sec");
    println!(
        "Max op:      {:.3} ms",
        stats.max_op_ns as f64 / 1_000_000.0
    );
    println!("Slow >1ms:   {}", stats.slow_ops_1ms);
    println!("Slow >10ms:  {}", stats.slow_ops_10ms);
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    init_tracing();

    println!("Range-Lock Contention Profiling");
    println!("===============================");

    let configs = [
        // Spread: mostly disjoint ranges, table churn dominates.
        RunConfig {
            threads: 16,
            ops_per_thread: 100_000,
            spread_regions: 512,
        },
        // Hot: heavy overlap, region locks dominate.
        RunConfig {
            threads: 16,
            ops_per_thread: 100_000,
            spread_regions: 4,
        },
    ];

    for config in &configs {
        println!(
            "\nRunning: {} threads x {} ops over {} regions...",
            config.threads, config.ops_per_thread, config.spread_regions
        );

        let mut results = Vec::new();
        for run in 1..=5 {
            print!("  Run {run}/5... ");
            std::io::Write::flush(&mut std::io::stdout()).unwrap();

            let (elapsed, stats) = run_benchmark(config);
            println!("{elapsed:?}");
            results.push((elapsed, stats));
        }

        // Report the slowest run; outliers are what we are hunting.
        let (slowest_idx, (elapsed, stats)) = results
            .iter()
            .enumerate()
            .max_by_key(|(_, (elapsed, _))| elapsed.as_nanos())
            .unwrap();

        println!("\n>>> Slowest run was #{} <<<", slowest_idx + 1);
        print_stats(config, *elapsed, stats);
    }
}
