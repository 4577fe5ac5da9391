//! Core ledger functionality
//!
//! Transactions, Merkle commitments, proof-of-work sealing, blocks and the
//! chain manager that ties them together.

pub mod block;
pub mod blockchain;
pub mod events;
pub mod merkle;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, BlockHeader, BlockSummary, EncodedHeader, GENESIS_PREVIOUS_HASH};
pub use blockchain::{audit_blocks, Blockchain, ChainFault, ChainSnapshot};
pub use events::{EventBus, LedgerEvent};
pub use merkle::{MerkleProof, MerkleTree, ProofElement};
pub use proof_of_work::{ProofOfWork, Seal, MAX_DIFFICULTY};
pub use transaction::{
    payload_from_serialize, payload_from_str, payload_from_value, Payload, Transaction,
};
