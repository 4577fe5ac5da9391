//! Ledger integration tests
//!
//! Exercises the public API the way the transport and auth layers use it:
//! submit verified readings, seal blocks, read snapshots, validate.

use device_ledger::core::{payload_from_value, Block, ProofOfWork, GENESIS_PREVIOUS_HASH};
use device_ledger::node::{spawn_intake, Miner, VerifiedSubmission};
use device_ledger::{
    audit_blocks, sha256_hex, BlockStore, Blockchain, LedgerConfig, LedgerEvent, MerkleTree,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[test]
fn test_genesis_block_invariants() {
    let chain = Blockchain::new(2).unwrap();
    let snapshot = chain.get_snapshot().unwrap();

    assert_eq!(snapshot.len(), 1);
    let genesis = &snapshot[0];
    assert_eq!(genesis.index, 0);
    assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
    assert!(genesis.hash.starts_with("00"));
    assert_eq!(genesis.merkle_root, sha256_hex(b"empty"));
    assert!(genesis.transactions.is_empty());
}

#[test]
fn test_two_devices_one_block() {
    let chain = Blockchain::new(2).unwrap();
    let genesis_hash = chain.tip_hash().unwrap();

    chain.submit_json("dev1", "network", json!({"t": 1})).unwrap();
    chain.submit_json("dev2", "network", json!({"t": 2})).unwrap();

    let block = chain.create_block().unwrap().expect("pool had transactions");
    assert_eq!(block.get_index(), 1);
    assert_eq!(block.get_previous_hash(), genesis_hash);
    assert!(block.get_hash().starts_with("00"));

    let txs = block.get_transactions();
    assert_eq!(txs[0].get_sender(), "dev1");
    assert_eq!(txs[1].get_sender(), "dev2");
    assert_eq!(
        block.get_merkle_root(),
        MerkleTree::calculate_merkle_root(txs).unwrap()
    );
    assert!(chain.validate());
}

#[test]
fn test_every_block_meets_difficulty() {
    let chain = Blockchain::new(2).unwrap();
    for i in 0..3 {
        chain.submit_json("dev1", "network", json!({ "i": i })).unwrap();
        chain.create_block().unwrap();
    }

    for summary in chain.get_snapshot().unwrap() {
        assert!(summary.hash.starts_with("00"), "block {}", summary.index);
    }
    assert!(chain.validate());
}

#[test]
fn test_empty_pool_produces_nothing() {
    let chain = Blockchain::new(1).unwrap();
    assert!(chain.create_block().unwrap().is_none());
    assert_eq!(chain.len(), 1);
}

#[test]
fn test_concurrent_devices_are_sealed_exactly_once() {
    let chain = Arc::new(Blockchain::new(1).unwrap());
    let devices = 8;
    let readings_per_device = 25;

    let handles: Vec<_> = (0..devices)
        .map(|d| {
            let chain = Arc::clone(&chain);
            thread::spawn(move || {
                for r in 0..readings_per_device {
                    chain
                        .submit_json(&format!("dev{d}"), "network", json!({ "d": d, "r": r }))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let block = chain.create_block().unwrap().unwrap();
    assert_eq!(block.get_transactions().len(), devices * readings_per_device);

    let seen: HashSet<(i64, i64)> = block
        .get_transactions()
        .iter()
        .map(|tx| {
            let p = tx.get_payload();
            (p["d"].as_i64().unwrap(), p["r"].as_i64().unwrap())
        })
        .collect();
    assert_eq!(seen.len(), devices * readings_per_device);
    assert!(chain.create_block().unwrap().is_none());
}

#[test]
fn test_snapshot_reads_race_with_mining() {
    let chain = Arc::new(Blockchain::new(1).unwrap());
    let miner = Miner::spawn(Arc::clone(&chain), Duration::from_millis(5));

    let reader = {
        let chain = Arc::clone(&chain);
        thread::spawn(move || {
            for _ in 0..200 {
                let snapshot = chain.get_chain_snapshot().unwrap();
                assert_eq!(snapshot.chain.len(), snapshot.length);
                // Every visible block links to its predecessor
                for pair in snapshot.chain.windows(2) {
                    assert_eq!(pair[1].previous_hash, pair[0].hash);
                }
            }
        })
    };

    for i in 0..20 {
        chain.submit_json("dev1", "network", json!({ "i": i })).unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    reader.join().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while chain.pending_count() > 0 {
        assert!(Instant::now() < deadline, "miner did not drain the pool");
        thread::sleep(Duration::from_millis(5));
    }
    miner.stop();

    let sealed: usize = chain
        .get_snapshot()
        .unwrap()
        .iter()
        .map(|b| b.transactions.len())
        .sum();
    assert_eq!(sealed, 20);
    assert!(chain.validate());
}

#[test]
fn test_intake_and_events_flow() {
    let chain = Arc::new(Blockchain::new(1).unwrap());
    let events = chain.subscribe();
    let (intake, handle) = spawn_intake(Arc::clone(&chain));

    intake
        .send(VerifiedSubmission {
            sender: "sensor-7".to_string(),
            recipient: "network".to_string(),
            payload: json!({"humidity": 40}),
        })
        .unwrap();
    drop(intake);
    assert_eq!(handle.join().unwrap(), 1);

    chain.create_block().unwrap().unwrap();

    let received: Vec<LedgerEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert!(matches!(
        &received[0],
        LedgerEvent::TransactionAccepted { sender, .. } if sender == "sensor-7"
    ));
    match &received[1] {
        LedgerEvent::BlockSealed(snapshot) => assert_eq!(snapshot.length, 2),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_persisted_chain_survives_restart() {
    let dir = tempdir().unwrap();
    let config = LedgerConfig::default()
        .with_difficulty(1)
        .with_data_dir(dir.path().join("ledger"));

    let first_tip = {
        let chain = Blockchain::open(&config).unwrap();
        chain.submit_json("dev1", "network", json!({"t": 1})).unwrap();
        chain.create_block().unwrap().unwrap();
        chain.tip_hash().unwrap()
    };

    let chain = Blockchain::open(&config).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.tip_hash().unwrap(), first_tip);
    drop(chain);

    let store = BlockStore::open(config.data_dir.as_ref().unwrap()).unwrap();
    let blocks = store.load_all().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(audit_blocks(blocks.as_slice(), 1), Ok(()));
}

#[test]
fn test_merkle_proof_for_sealed_transaction() {
    let txs: Vec<_> = (0..3)
        .map(|i| {
            device_ledger::Transaction::new(
                &format!("dev{i}"),
                "network",
                1000.0 + i as f64,
                payload_from_value(json!({ "i": i })).unwrap(),
            )
            .unwrap()
        })
        .collect();
    let block = Block::new_block(1, txs, 2000.0, "prev".to_string(), &ProofOfWork::new(1)).unwrap();

    for i in 0..3 {
        let proof = block.generate_merkle_proof(i).unwrap();
        assert!(block.verify_merkle_proof(&proof));
    }
}
