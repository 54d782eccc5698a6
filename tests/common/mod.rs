//! Common test utilities: tracing setup for integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: filter directives (e.g., `rangelock=trace`)
//! - `RANGELOCK_LOG_CONSOLE`: set to "0" to disable console output
//!
//! Lock-path events only appear when the crate is built with
//! `--features tracing`; without it the macros compile to no-ops and these
//! tests still pass, just silently.

#![allow(dead_code)]

use std::env;
use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rangelock=debug"));

        let console_enabled = env::var("RANGELOCK_LOG_CONSOLE")
            .map(|v| v != "0")
            .unwrap_or(true);

        if console_enabled {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_target(true)
                .with_test_writer();

            let _ = Registry::default().with(filter).with(fmt_layer).try_init();
        }
    });
}
