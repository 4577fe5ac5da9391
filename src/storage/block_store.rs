// Durable record of sealed blocks, one immutable entry per index
// I keep the chain in memory for reads; this store is only written on append
// and read back once when a node starts

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use log::{error, info};
use sled::{Db, Tree};
use std::path::Path;

const BLOCKS_TREE: &str = "blocks";

pub struct BlockStore {
    db: Db,
    blocks: Tree,
}

impl BlockStore {
    pub fn open(path: &Path) -> Result<BlockStore> {
        let db = sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        let blocks = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))?;

        info!("Opened block store at {} ({} blocks)", path.display(), blocks.len());
        Ok(BlockStore { db, blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Write a sealed block. Records are never overwritten, and a failed
    /// append leaves no record behind so the index can be sealed again.
    pub fn append(&self, block: &Block) -> Result<()> {
        let key = block.get_index().to_be_bytes();
        let record = block.to_json()?;

        // compare_and_swap against "absent" makes the write insert-only
        let swapped = self
            .blocks
            .compare_and_swap(key, None as Option<&[u8]>, Some(record))
            .map_err(|e| BlockchainError::Database(format!("Failed to write block: {e}")))?;
        if swapped.is_err() {
            return Err(BlockchainError::InvalidBlock(format!(
                "Block {} is already stored",
                block.get_index()
            )));
        }

        let flushed = self
            .db
            .flush()
            .map(|_| ())
            .map_err(|e| BlockchainError::Database(format!("Failed to flush block store: {e}")));
        self.settle(block.get_index(), flushed)
    }

    fn settle(&self, index: u64, flushed: Result<()>) -> Result<()> {
        if let Err(e) = flushed {
            if let Err(undo) = self.blocks.remove(index.to_be_bytes()) {
                error!("Failed to roll back block {index} after a flush error: {undo}");
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, index: u64) -> Result<Option<Block>> {
        match self.blocks.get(index.to_be_bytes())? {
            Some(bytes) => Ok(Some(Block::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All stored blocks in index order. Big-endian keys sort numerically.
    pub fn load_all(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (_, bytes) = entry?;
            blocks.push(Block::from_json(&bytes)?);
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProofOfWork;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_load_in_index_order() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let pow = ProofOfWork::new(0);

        let genesis = Block::generate_genesis_block(&pow).unwrap();
        store.append(&genesis).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0).unwrap(), Some(genesis.clone()));
        assert_eq!(store.get(1).unwrap(), None);
        assert_eq!(store.load_all().unwrap(), vec![genesis]);
    }

    #[test]
    fn test_records_are_not_overwritten() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let pow = ProofOfWork::new(0);

        let genesis = Block::generate_genesis_block(&pow).unwrap();
        store.append(&genesis).unwrap();
        let err = store.append(&genesis).unwrap_err();
        assert!(matches!(err, BlockchainError::InvalidBlock(_)));
    }

    #[test]
    fn test_failed_flush_leaves_index_free() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        let genesis = Block::generate_genesis_block(&ProofOfWork::new(0)).unwrap();
        store.append(&genesis).unwrap();

        let err = store
            .settle(0, Err(BlockchainError::Database("disk full".to_string())))
            .unwrap_err();
        assert_eq!(err, BlockchainError::Database("disk full".to_string()));
        assert_eq!(store.get(0).unwrap(), None);
        assert!(store.is_empty());

        // The same block can be written again on the next attempt
        store.append(&genesis).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![genesis]);
    }

    #[test]
    fn test_reopen_sees_flushed_blocks() {
        let dir = tempdir().unwrap();
        let genesis = Block::generate_genesis_block(&ProofOfWork::new(1)).unwrap();
        {
            let store = BlockStore::open(dir.path()).unwrap();
            store.append(&genesis).unwrap();
        }

        let reopened = BlockStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load_all().unwrap(), vec![genesis]);
    }
}
