//! Test utilities for ledger testing

use crate::config::LedgerConfig;
use crate::core::{payload_from_value, Blockchain, Payload};
use crate::error::Result;
use serde_json::json;
use tempfile::TempDir;

/// Difficulty used by fixtures: real work, but fast
pub const TEST_DIFFICULTY: u32 = 1;

/// A payload shaped like a sensor reading
pub fn sample_payload(seq: u64) -> Payload {
    payload_from_value(json!({
        "seq": seq,
        "temperature": 20.5 + seq as f64,
        "unit": "C",
    }))
    .expect("sample payload is an object")
}

/// Config pointing at a fresh temporary data directory
pub fn create_persistent_config() -> Result<(LedgerConfig, TempDir)> {
    let temp_dir = tempfile::tempdir()?;
    let config = LedgerConfig::default()
        .with_difficulty(TEST_DIFFICULTY)
        .with_data_dir(temp_dir.path().join("ledger"));
    Ok((config, temp_dir))
}

/// In-memory chain with `blocks` sealed blocks after genesis, one reading each
pub fn create_test_chain(blocks: u64) -> Result<Blockchain> {
    let chain = Blockchain::new(TEST_DIFFICULTY)?;
    for seq in 0..blocks {
        chain.submit_transaction(&format!("device-{seq}"), "network", sample_payload(seq))?;
        chain.create_block()?;
    }
    Ok(chain)
}
