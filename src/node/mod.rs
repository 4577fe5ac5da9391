//! Node runtime
//!
//! The periodic miner and the intake that feeds verified submissions from the
//! authentication layer into the chain.

pub mod intake;
pub mod miner;

pub use intake::{forward_lines, spawn_intake, VerifiedSubmission, NETWORK_RECIPIENT};
pub use miner::Miner;
