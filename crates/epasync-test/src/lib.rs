//! Test harnesses for epasync.
//!
//! Holds the CLI regression tests that drive the `epasync` binary against
//! the shared fixtures in `tests/fixtures`.

#[cfg(test)]
pub mod cli;
