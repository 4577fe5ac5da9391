//! Fixtures for unit tests: low-difficulty chains and sample readings.

pub mod test_utils;

pub use test_utils::*;
