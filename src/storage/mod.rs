//! Data storage
//!
//! The pending-transaction pool and the optional on-disk record of sealed
//! blocks.

pub mod block_store;
pub mod memory_pool;

pub use block_store::BlockStore;
pub use memory_pool::TransactionPool;
