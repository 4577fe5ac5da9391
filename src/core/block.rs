use crate::core::{MerkleProof, MerkleTree, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_string, current_timestamp, sha256_hex};
use log::info;
use serde::{Deserialize, Serialize};

/// `previous_hash` carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    transactions: Vec<Transaction>,
    timestamp: f64,
    previous_hash: String,
    nonce: u64,
    merkle_root: String,
    hash: String,
}

/// The hashed part of a block: every field except `hash` and `nonce`
pub struct BlockHeader<'a> {
    pub index: u64,
    pub transactions: &'a [Transaction],
    pub timestamp: f64,
    pub previous_hash: &'a str,
    pub merkle_root: &'a str,
}

/// Canonical header encoding split around the nonce.
///
/// Sorted keys put `nonce` between `merkle_root` and `previous_hash`, so the
/// bytes for a given nonce are `prefix + nonce + suffix`. Serializing the
/// transactions once keeps each sealing attempt to a single SHA-256.
#[derive(Debug, Clone)]
pub struct EncodedHeader {
    prefix: String,
    suffix: String,
}

/// Read-only view of a block handed to the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub hash: String,
    pub previous_hash: String,
    pub merkle_root: String,
}

impl<'a> BlockHeader<'a> {
    pub fn encode(&self) -> Result<EncodedHeader> {
        let prefix = format!(
            "{{\"index\":{},\"merkle_root\":{},\"nonce\":",
            self.index,
            canonical_string(self.merkle_root)?
        );
        let suffix = format!(
            ",\"previous_hash\":{},\"timestamp\":{},\"transactions\":{}}}",
            canonical_string(self.previous_hash)?,
            canonical_string(&self.timestamp)?,
            canonical_string(self.transactions)?
        );
        Ok(EncodedHeader { prefix, suffix })
    }
}

impl EncodedHeader {
    pub fn canonical_bytes(&self, nonce: u64) -> Vec<u8> {
        format!("{}{}{}", self.prefix, nonce, self.suffix).into_bytes()
    }

    pub fn hash(&self, nonce: u64) -> String {
        sha256_hex(&self.canonical_bytes(nonce))
    }
}

impl Block {
    /// Build and seal a block. The proof-of-work search runs on the caller's
    /// thread, so callers must not hold the chain lock here.
    pub fn new_block(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: f64,
        previous_hash: String,
        pow: &ProofOfWork,
    ) -> Result<Block> {
        let merkle_root = MerkleTree::calculate_merkle_root(&transactions)?;

        let encoded = BlockHeader {
            index,
            transactions: &transactions,
            timestamp,
            previous_hash: &previous_hash,
            merkle_root: &merkle_root,
        }
        .encode()?;

        info!(
            "Starting proof-of-work for block {index} ({} transactions, difficulty {})",
            transactions.len(),
            pow.get_difficulty()
        );
        let seal = pow.run(&encoded)?;
        info!(
            "Proof-of-work completed for block {index}: {} after {} attempts",
            seal.hash, seal.attempts
        );

        Ok(Block {
            index,
            transactions,
            timestamp,
            previous_hash,
            nonce: seal.nonce,
            merkle_root,
            hash: seal.hash,
        })
    }

    pub fn generate_genesis_block(pow: &ProofOfWork) -> Result<Block> {
        Block::new_block(
            0,
            Vec::new(),
            current_timestamp()?,
            GENESIS_PREVIOUS_HASH.to_string(),
            pow,
        )
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_merkle_root(&self) -> &str {
        self.merkle_root.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            index: self.index,
            transactions: &self.transactions,
            timestamp: self.timestamp,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
        }
    }

    /// Re-derive the hash from the stored fields and nonce
    pub fn calculate_hash(&self) -> Result<String> {
        Ok(self.header().encode()?.hash(self.nonce))
    }

    /// Verify that the block's Merkle root matches its transactions
    pub fn verify_merkle_root(&self) -> Result<bool> {
        MerkleTree::verify_transactions(&self.transactions, &self.merkle_root)
    }

    /// Generate a Merkle proof for a transaction in this block
    pub fn generate_merkle_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        if transaction_index >= self.transactions.len() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Transaction index {} out of bounds (block {} has {})",
                transaction_index,
                self.index,
                self.transactions.len()
            )));
        }

        MerkleTree::new(&self.transactions)?.generate_proof(transaction_index)
    }

    /// Verify a Merkle proof against this block's Merkle root
    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> bool {
        proof.merkle_root == self.merkle_root && MerkleTree::verify_proof(proof)
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions.clone(),
            hash: self.hash.clone(),
            previous_hash: self.previous_hash.clone(),
            merkle_root: self.merkle_root.clone(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Block> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// Mutators for tamper-detection tests; sealed blocks are otherwise immutable
#[cfg(test)]
impl Block {
    pub(crate) fn set_timestamp(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
    }

    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub(crate) fn set_previous_hash(&mut self, previous_hash: &str) {
        self.previous_hash = previous_hash.to_string();
    }

    pub(crate) fn set_hash(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }

    pub(crate) fn set_merkle_root(&mut self, merkle_root: &str) {
        self.merkle_root = merkle_root.to_string();
    }

    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}
