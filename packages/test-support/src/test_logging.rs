//! Unified test logging initialization.
//!
//! Single source of truth for logging setup in both unit tests and
//! integration tests. Uses a one-time guard so repeated calls (one per test
//! binary, plus any explicit calls inside tests) never panic.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Initialize structured logging for tests.
///
/// Idempotent and race-safe. The filter is read in order of precedence:
///
/// 1. `TEST_LOG` environment variable
/// 2. `RUST_LOG` environment variable
/// 3. `"warn"` (default, quiet)
///
/// The subscriber uses `with_test_writer()` so output is captured per test
/// by cargo/nextest, and `without_time()` for stable output.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}
