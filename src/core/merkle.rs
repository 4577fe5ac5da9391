use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// Preimage of the root committed by a block with no transactions
const EMPTY_ROOT_PREIMAGE: &[u8] = b"empty";

/// Merkle tree over an ordered transaction list
///
/// Leaves are the hex SHA-256 of each transaction's canonical encoding. Each
/// parent is the SHA-256 of the two child hex strings concatenated. An odd
/// level duplicates its last hash before pairing. The commitment is order
/// sensitive: permuting the transactions changes the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleTree {
    /// levels[0] holds the leaves, the last level holds the root
    levels: Vec<Vec<String>>,
}

/// Inclusion proof for one transaction of a block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash of the transaction being proven
    pub transaction_hash: String,
    /// Root the proof resolves to
    pub merkle_root: String,
    /// Sibling hashes from the leaf level upwards
    pub proof_path: Vec<ProofElement>,
    /// Index of the transaction in the block
    pub transaction_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    pub hash: String,
    /// Direction: true if sibling is on the right, false if on the left
    pub is_right: bool,
}

impl MerkleTree {
    /// Build the full tree for a non-empty transaction list
    pub fn new(transactions: &[Transaction]) -> Result<Self> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Cannot create Merkle tree from empty transaction list".to_string(),
            ));
        }

        let leaves = Self::leaf_hashes(transactions)?;
        Ok(Self::from_hashes(leaves))
    }

    /// Build a tree from precomputed leaf hashes
    pub fn from_hashes(leaves: Vec<String>) -> Self {
        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let next = Self::next_level(&levels[levels.len() - 1]);
            levels.push(next);
        }
        MerkleTree { levels }
    }

    pub fn get_root_hash(&self) -> Result<String> {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .ok_or_else(|| BlockchainError::InvalidBlock("Merkle tree has no root".to_string()))
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Generate an inclusion proof for the transaction at `transaction_index`
    pub fn generate_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        if transaction_index >= self.leaf_count() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Transaction index {} out of bounds (leaves: {})",
                transaction_index,
                self.leaf_count()
            )));
        }

        let mut proof_path = Vec::new();
        let mut position = transaction_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = position % 2 == 0;
            let sibling = if is_right {
                // The last node of an odd level is paired with itself
                level.get(position + 1).unwrap_or(&level[position])
            } else {
                &level[position - 1]
            };
            proof_path.push(ProofElement {
                hash: sibling.clone(),
                is_right,
            });
            position /= 2;
        }

        Ok(MerkleProof {
            transaction_hash: self.levels[0][transaction_index].clone(),
            merkle_root: self.get_root_hash()?,
            proof_path,
            transaction_index,
        })
    }

    /// Verify a Merkle proof by folding the path back up to the root
    pub fn verify_proof(proof: &MerkleProof) -> bool {
        let mut current_hash = proof.transaction_hash.clone();

        for element in &proof.proof_path {
            current_hash = if element.is_right {
                Self::hash_pair(&current_hash, &element.hash)
            } else {
                Self::hash_pair(&element.hash, &current_hash)
            };
        }

        current_hash == proof.merkle_root
    }

    fn leaf_hashes(transactions: &[Transaction]) -> Result<Vec<String>> {
        transactions.iter().map(Transaction::leaf_hash).collect()
    }

    fn next_level(level: &[String]) -> Vec<String> {
        level
            .chunks(2)
            .map(|pair| {
                // Duplicate the last hash if odd number
                let right = pair.get(1).unwrap_or(&pair[0]);
                Self::hash_pair(&pair[0], right)
            })
            .collect()
    }

    /// Parent hash: SHA-256 over the two hex strings concatenated
    fn hash_pair(left: &str, right: &str) -> String {
        let mut combined = String::with_capacity(left.len() + right.len());
        combined.push_str(left);
        combined.push_str(right);
        sha256_hex(combined.as_bytes())
    }
}

/// Utility functions for Merkle tree operations
impl MerkleTree {
    /// Root committed by a block with no transactions
    pub fn empty_root() -> String {
        sha256_hex(EMPTY_ROOT_PREIMAGE)
    }

    /// Calculate the Merkle root for an ordered transaction list.
    /// This doesn't keep the intermediate levels.
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<String> {
        if transactions.is_empty() {
            return Ok(Self::empty_root());
        }

        let mut current_level = Self::leaf_hashes(transactions)?;
        while current_level.len() > 1 {
            current_level = Self::next_level(&current_level);
        }

        current_level
            .pop()
            .ok_or_else(|| BlockchainError::InvalidBlock("Failed to build Merkle root".to_string()))
    }

    /// Verify that a list of transactions produces the expected Merkle root
    pub fn verify_transactions(transactions: &[Transaction], expected_root: &str) -> Result<bool> {
        Ok(Self::calculate_merkle_root(transactions)? == expected_root)
    }
}
