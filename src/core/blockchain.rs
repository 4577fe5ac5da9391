// This is the chain manager - the single authoritative writer of the ledger
// Blocks live in memory behind an RwLock so readers always see a whole chain,
// the pending pool has its own mutex, and sealing happens with neither held

use crate::config::LedgerConfig;
use crate::core::{
    payload_from_value, Block, BlockSummary, EventBus, LedgerEvent, MerkleTree, Payload,
    ProofOfWork, Transaction,
};
use crate::error::{BlockchainError, Result};
use crate::storage::{BlockStore, TransactionPool};
use crate::utils::current_timestamp;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The `{chain, length}` body served to clients and pushed after each block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<BlockSummary>,
    pub length: usize,
}

/// First inconsistency found by `Blockchain::audit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    /// The chain holds no blocks at all
    MissingGenesis,
    /// Block at `position` claims a different index
    IndexMismatch { position: u64, found: u64 },
    /// Stored hash is not the hash of the stored fields
    HashMismatch { index: u64 },
    /// Stored Merkle root does not commit to the stored transactions
    MerkleMismatch { index: u64 },
    /// Hash does not carry the required leading zeros
    InsufficientWork { index: u64 },
    /// `previous_hash` differs from the predecessor's hash
    BrokenLink { index: u64 },
    /// Block fields could not be re-encoded
    Unreadable { index: u64, reason: String },
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFault::MissingGenesis => write!(f, "chain has no genesis block"),
            ChainFault::IndexMismatch { position, found } => {
                write!(f, "block at position {position} has index {found}")
            }
            ChainFault::HashMismatch { index } => write!(f, "block {index}: hash mismatch"),
            ChainFault::MerkleMismatch { index } => {
                write!(f, "block {index}: merkle root mismatch")
            }
            ChainFault::InsufficientWork { index } => {
                write!(f, "block {index}: hash misses difficulty target")
            }
            ChainFault::BrokenLink { index } => {
                write!(f, "block {index}: previous_hash does not match predecessor")
            }
            ChainFault::Unreadable { index, reason } => write!(f, "block {index}: {reason}"),
        }
    }
}

pub struct Blockchain {
    blocks: RwLock<Vec<Arc<Block>>>,
    pool: TransactionPool,
    // Held for the whole of create_block so there is only ever one miner
    seal_lock: Mutex<()>,
    difficulty: u32,
    max_seal_attempts: Option<u64>,
    cancel_check_interval: u64,
    cancel_flag: Arc<AtomicBool>,
    seal_attempts: Arc<AtomicU64>,
    events: EventBus,
    store: Option<BlockStore>,
}

impl Blockchain {
    /// In-memory chain with a freshly sealed genesis block
    pub fn new(difficulty: u32) -> Result<Blockchain> {
        Self::open(&LedgerConfig::default().with_difficulty(difficulty))
    }

    /// Build a chain from config. With a `data_dir` the stored blocks are
    /// reloaded and audited; an empty store gets a new genesis block.
    pub fn open(config: &LedgerConfig) -> Result<Blockchain> {
        config.validate()?;

        let store = match &config.data_dir {
            Some(path) => Some(BlockStore::open(path)?),
            None => None,
        };

        let mut chain = Blockchain {
            blocks: RwLock::new(Vec::new()),
            pool: TransactionPool::new(),
            seal_lock: Mutex::new(()),
            difficulty: config.difficulty,
            max_seal_attempts: config.max_seal_attempts,
            cancel_check_interval: config.cancel_check_interval,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            seal_attempts: Arc::new(AtomicU64::new(0)),
            events: EventBus::new(),
            store,
        };

        let stored = match &chain.store {
            Some(store) => store.load_all()?,
            None => Vec::new(),
        };

        let blocks = if stored.is_empty() {
            info!("Creating genesis block (difficulty {})", chain.difficulty);
            let genesis = Block::generate_genesis_block(&chain.proof_of_work())?;
            if let Some(store) = &chain.store {
                store.append(&genesis)?;
            }
            info!("Genesis block sealed: {}", genesis.get_hash());
            vec![genesis]
        } else {
            audit_blocks(stored.as_slice(), chain.difficulty).map_err(|fault| {
                BlockchainError::InvalidBlock(format!("Stored chain failed validation: {fault}"))
            })?;
            info!("Loaded {} blocks from store", stored.len());
            stored
        };

        chain.blocks = RwLock::new(blocks.into_iter().map(Arc::new).collect());
        Ok(chain)
    }

    fn proof_of_work(&self) -> ProofOfWork {
        let pow = ProofOfWork::new(self.difficulty)
            .with_cancel_flag(Arc::clone(&self.cancel_flag))
            .with_check_interval(self.cancel_check_interval)
            .with_attempt_counter(Arc::clone(&self.seal_attempts));
        match self.max_seal_attempts {
            Some(cap) => pow.with_max_attempts(cap),
            None => pow,
        }
    }

    fn read_blocks(&self) -> Result<RwLockReadGuard<'_, Vec<Arc<Block>>>> {
        self.blocks.read().map_err(|_| {
            error!("Failed to acquire read lock on chain");
            BlockchainError::Lock("chain".to_string())
        })
    }

    fn write_blocks(&self) -> Result<RwLockWriteGuard<'_, Vec<Arc<Block>>>> {
        self.blocks.write().map_err(|_| {
            error!("Failed to acquire write lock on chain");
            BlockchainError::Lock("chain".to_string())
        })
    }

    /// Accept a transaction whose sender and payload were already verified
    /// by the authentication layer. No signature checks happen here.
    pub fn submit_transaction(&self, sender: &str, recipient: &str, payload: Payload) -> Result<bool> {
        let timestamp = current_timestamp()?;
        let transaction = Transaction::new(sender, recipient, timestamp, payload)?;

        // Fail now rather than hash an inconsistent representation later
        transaction
            .canonical_bytes()
            .map_err(|e| BlockchainError::MalformedPayload(e.to_string()))?;

        let event = LedgerEvent::TransactionAccepted {
            sender: sender.to_string(),
            payload: transaction.get_payload().clone(),
            timestamp,
        };
        let accepted = self.pool.submit(transaction)?;
        debug!("Accepted transaction from {sender} to {recipient}");
        self.events.publish(event);
        Ok(accepted)
    }

    /// Same as `submit_transaction` for a raw JSON payload, which must be an object
    pub fn submit_json(&self, sender: &str, recipient: &str, payload: Value) -> Result<bool> {
        self.submit_transaction(sender, recipient, payload_from_value(payload)?)
    }

    /// Seal every pending transaction into a new block.
    ///
    /// Returns `Ok(None)` when the pool is empty. The pool is drained under its
    /// lock, the proof-of-work runs with no lock held, and the chain write lock
    /// is taken only to append. If sealing or appending fails the batch goes
    /// back to the front of the pool.
    pub fn create_block(&self) -> Result<Option<Block>> {
        let _sealing = self.seal_lock.lock().map_err(|_| {
            error!("Failed to acquire seal lock");
            BlockchainError::Lock("seal".to_string())
        })?;

        let transactions = self.pool.drain_all()?;
        if transactions.is_empty() {
            debug!("No pending transactions, nothing to seal");
            return Ok(None);
        }

        match self.seal_and_append(&transactions) {
            Ok(block) => Ok(Some(block)),
            Err(e) => {
                warn!(
                    "Failed to seal {} transactions, returning them to the pool: {e}",
                    transactions.len()
                );
                self.pool.restore(transactions)?;
                Err(e)
            }
        }
    }

    fn seal_and_append(&self, transactions: &[Transaction]) -> Result<Block> {
        let (index, previous_hash) = {
            let blocks = self.read_blocks()?;
            let tip = blocks.last().ok_or_else(|| {
                BlockchainError::InvalidBlock("Chain has no genesis block".to_string())
            })?;
            (blocks.len() as u64, tip.get_hash().to_string())
        };

        let block = Block::new_block(
            index,
            transactions.to_vec(),
            current_timestamp()?,
            previous_hash,
            &self.proof_of_work(),
        )?;

        let mut blocks = self.write_blocks()?;
        // Only one miner runs at a time, but the tip must still be the one we sealed against
        let tip_hash = blocks.last().map(|tip| tip.get_hash());
        if blocks.len() as u64 != index || tip_hash != Some(block.get_previous_hash()) {
            return Err(BlockchainError::InvalidBlock(format!(
                "Chain tip advanced while sealing block {index}"
            )));
        }

        if let Some(store) = &self.store {
            store.append(&block)?;
        }
        blocks.push(Arc::new(block.clone()));

        let snapshot = if self.events.subscriber_count() > 0 {
            Some(snapshot_of(&blocks))
        } else {
            None
        };
        drop(blocks);

        info!(
            "Appended block {} with {} transactions: {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_hash()
        );
        if let Some(snapshot) = snapshot {
            self.events.publish(LedgerEvent::BlockSealed(snapshot));
        }
        Ok(block)
    }

    /// Summaries of every block, from one consistent view of the chain
    pub fn get_snapshot(&self) -> Result<Vec<BlockSummary>> {
        Ok(self.get_chain_snapshot()?.chain)
    }

    pub fn get_chain_snapshot(&self) -> Result<ChainSnapshot> {
        let blocks = self.read_blocks()?;
        Ok(snapshot_of(&blocks))
    }

    /// Re-derive every invariant from stored data. Never mutates the chain.
    pub fn validate(&self) -> bool {
        self.audit().is_ok()
    }

    /// Like `validate`, but reports the first fault found
    pub fn audit(&self) -> std::result::Result<(), ChainFault> {
        // A poisoned lock still guards a complete Vec: pushes happen in one step
        let blocks = self.blocks.read().unwrap_or_else(PoisonError::into_inner);
        audit_blocks(blocks.as_slice(), self.difficulty)
    }

    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        let blocks = self.read_blocks()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| blocks.get(i))
            .map(|block| block.as_ref().clone()))
    }

    pub fn tip_hash(&self) -> Result<String> {
        let blocks = self.read_blocks()?;
        blocks
            .last()
            .map(|tip| tip.get_hash().to_string())
            .ok_or_else(|| BlockchainError::InvalidBlock("Chain has no genesis block".to_string()))
    }

    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Hash attempts made by every seal so far, for monitoring
    pub fn total_seal_attempts(&self) -> u64 {
        self.seal_attempts.load(Ordering::Relaxed)
    }

    /// Flag polled by every seal. Raising it aborts the running seal and any
    /// later one until it is lowered again.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    pub fn cancel_sealing(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn resume_sealing(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    #[cfg(test)]
    pub(crate) fn tamper(&self, index: usize, edit: impl FnOnce(&mut Block)) {
        let mut blocks = self.blocks.write().unwrap();
        edit(Arc::make_mut(&mut blocks[index]));
    }
}

fn snapshot_of(blocks: &[Arc<Block>]) -> ChainSnapshot {
    ChainSnapshot {
        chain: blocks.iter().map(|block| block.summary()).collect(),
        length: blocks.len(),
    }
}

/// Check hashes, Merkle roots, work and links for a whole chain.
/// The genesis block is exempt from the link check only.
pub fn audit_blocks<B: Borrow<Block>>(blocks: &[B], difficulty: u32) -> std::result::Result<(), ChainFault> {
    if blocks.is_empty() {
        return Err(ChainFault::MissingGenesis);
    }

    for (position, block) in blocks.iter().enumerate() {
        let block: &Block = block.borrow();
        let index = block.get_index();
        if index != position as u64 {
            return Err(ChainFault::IndexMismatch {
                position: position as u64,
                found: index,
            });
        }

        let unreadable = move |e: BlockchainError| ChainFault::Unreadable {
            index,
            reason: e.to_string(),
        };

        let recomputed = block.calculate_hash().map_err(unreadable)?;
        if recomputed != block.get_hash() {
            return Err(ChainFault::HashMismatch { index });
        }

        let root = MerkleTree::calculate_merkle_root(block.get_transactions()).map_err(unreadable)?;
        if root != block.get_merkle_root() {
            return Err(ChainFault::MerkleMismatch { index });
        }

        if !ProofOfWork::meets_target(block.get_hash(), difficulty) {
            return Err(ChainFault::InsufficientWork { index });
        }

        if position > 0 {
            let previous: &Block = blocks[position - 1].borrow();
            if block.get_previous_hash() != previous.get_hash() {
                return Err(ChainFault::BrokenLink { index });
            }
        }
    }

    Ok(())
}
