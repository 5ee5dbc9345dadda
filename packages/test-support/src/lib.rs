//! Test support utilities shared by unit and integration tests.
//!
//! Currently this is the unified logging initialization; keeping it in its
//! own package lets `tests/` integration binaries share the same one-time
//! guard as in-crate unit tests.

pub mod test_logging;
