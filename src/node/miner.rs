use crate::core::Blockchain;
use crate::error::BlockchainError;
use log::{debug, error, info, warn};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodic block producer: calls `create_block` once per interval on its own thread
pub struct Miner {
    chain: Arc<Blockchain>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<u64>>,
}

impl Miner {
    pub fn spawn(chain: Arc<Blockchain>, interval: Duration) -> Miner {
        let (stop_tx, stop_rx) = channel::<()>();
        let worker_chain = Arc::clone(&chain);

        let handle = thread::spawn(move || {
            let mut sealed = 0u64;
            info!("Miner started (interval {interval:?})");
            loop {
                match worker_chain.create_block() {
                    Ok(Some(block)) => {
                        sealed += 1;
                        info!("Miner sealed block {}", block.get_index());
                    }
                    Ok(None) => debug!("Miner round: pool empty"),
                    Err(BlockchainError::SealAborted { attempts }) => {
                        warn!("Miner seal aborted after {attempts} attempts");
                    }
                    Err(e) => error!("Miner round failed: {e}"),
                }

                // Sleep for the interval, waking early on stop
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("Miner stopped after sealing {sealed} blocks");
            sealed
        });

        Miner {
            chain,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop the loop, abort any seal in progress and wait for the thread.
    /// Returns the number of blocks this miner sealed.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        let _ = self.stop_tx.send(());
        self.chain.cancel_sealing();
        let sealed = match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("Miner thread panicked");
                0
            }),
            None => 0,
        };
        self.chain.resume_sealing();
        sealed
    }
}

impl Drop for Miner {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}
