//! # Device Ledger - an append-only log of verified device readings
//!
//! A single authoritative writer keeps a chain of blocks in memory. Each block
//! commits to its transactions through a Merkle root and is sealed by a
//! proof-of-work search over its canonical JSON header.
//!
//! ## How the code is organized
//! - `core/`: transactions, Merkle trees, proof-of-work, blocks, the chain manager, events
//! - `storage/`: the pending transaction pool and the optional sled block store
//! - `node/`: the periodic miner and the intake for pre-verified submissions
//! - `config/`: node settings from defaults, TOML and environment
//! - `utils/`: hashing, timestamps, canonical JSON
//! - `cli/`: command-line interface for the binary
//!
//! ## Things to keep in mind
//! - The ledger does no signature checks. Callers of `submit_transaction`
//!   have already authenticated the device.
//! - Sealing never runs under a lock: the pool is drained, the lock released,
//!   the nonce found, and only then is the chain locked to append.
//! - Everything that is hashed goes through the canonical JSON encoding, so
//!   validation can recompute hashes byte for byte.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod node;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::LedgerConfig;
pub use core::{
    audit_blocks, payload_from_str, payload_from_value, Block, BlockSummary, Blockchain,
    ChainFault, ChainSnapshot, LedgerEvent, MerkleProof, MerkleTree, Payload, ProofOfWork,
    Transaction,
};
pub use error::{BlockchainError, Result};
pub use node::{Miner, VerifiedSubmission};
pub use storage::{BlockStore, TransactionPool};
pub use utils::{canonical_json, current_timestamp, sha256_digest, sha256_hex};
