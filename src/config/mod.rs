//! Configuration management
//!
//! Node settings: difficulty, miner interval, persistence and sealing limits.

pub mod settings;

pub use settings::LedgerConfig;
