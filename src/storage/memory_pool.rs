use crate::core::Transaction;
use crate::error::{BlockchainError, Result};
use std::sync::Mutex;

/// Pending, already-verified transactions in arrival order.
///
/// `submit` and `drain_all` take the same mutex, so a transaction is either
/// in the pool or in exactly one drained batch.
pub struct TransactionPool {
    inner: Mutex<Vec<Transaction>>,
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Append a transaction. There is no admission or dedup policy.
    pub fn submit(&self, tx: Transaction) -> Result<bool> {
        match self.inner.lock() {
            Ok(mut pool) => {
                pool.push(tx);
                Ok(true)
            }
            Err(_) => {
                log::error!("Failed to acquire lock on transaction pool");
                Err(BlockchainError::Lock("transaction pool".to_string()))
            }
        }
    }

    /// Swap the contents out and leave the pool empty
    pub fn drain_all(&self) -> Result<Vec<Transaction>> {
        match self.inner.lock() {
            Ok(mut pool) => Ok(std::mem::take(&mut *pool)),
            Err(_) => {
                log::error!("Failed to acquire lock on transaction pool");
                Err(BlockchainError::Lock("transaction pool".to_string()))
            }
        }
    }

    /// Put a drained batch back in front of anything submitted since
    pub fn restore(&self, batch: Vec<Transaction>) -> Result<()> {
        match self.inner.lock() {
            Ok(mut pool) => {
                let newer = std::mem::replace(&mut *pool, batch);
                pool.extend(newer);
                Ok(())
            }
            Err(_) => {
                log::error!("Failed to acquire lock on transaction pool");
                Err(BlockchainError::Lock("transaction pool".to_string()))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire lock on transaction pool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload_from_value;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn tx(sender: &str, t: i64) -> Transaction {
        Transaction::new(sender, "network", 1.0, payload_from_value(json!({ "t": t })).unwrap())
            .unwrap()
    }

    #[test]
    fn test_drain_preserves_arrival_order() {
        let pool = TransactionPool::new();
        for i in 0..5 {
            assert!(pool.submit(tx("dev", i)).unwrap());
        }

        let drained = pool.drain_all().unwrap();
        let order: Vec<i64> = drained
            .iter()
            .map(|t| t.get_payload()["t"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_drain_on_empty_pool_returns_nothing() {
        let pool = TransactionPool::new();
        assert!(pool.drain_all().unwrap().is_empty());
    }

    #[test]
    fn test_consecutive_drains_do_not_overlap() {
        let pool = TransactionPool::new();
        pool.submit(tx("dev", 1)).unwrap();
        assert_eq!(pool.drain_all().unwrap().len(), 1);
        assert!(pool.drain_all().unwrap().is_empty());
    }

    #[test]
    fn test_restore_puts_batch_first() {
        let pool = TransactionPool::new();
        pool.submit(tx("dev", 1)).unwrap();
        let batch = pool.drain_all().unwrap();
        pool.submit(tx("dev", 2)).unwrap();

        pool.restore(batch).unwrap();

        let drained = pool.drain_all().unwrap();
        assert_eq!(drained, vec![tx("dev", 1), tx("dev", 2)]);
    }

    #[test]
    fn test_concurrent_submissions_are_not_lost() {
        let pool = Arc::new(TransactionPool::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..50 {
                        pool.submit(tx(&format!("dev{worker}"), i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = pool.drain_all().unwrap();
        assert_eq!(drained.len(), 400);
        let unique: HashSet<String> = drained.iter().map(|t| t.leaf_hash().unwrap()).collect();
        assert_eq!(unique.len(), 400);
    }
}
