// Entry point for the ledger node binary
use clap::Parser;
use device_ledger::node::{forward_lines, spawn_intake, Miner, VerifiedSubmission};
use device_ledger::{
    audit_blocks, BlockStore, Blockchain, BlockchainError, Command, LedgerConfig, LedgerEvent, Opt,
};
use log::{error, info};
use std::fs;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;

fn main() {
    // Info by default, RUST_LOG overrides
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Run { config } => {
            let config = LedgerConfig::load(config.as_deref())?;
            let chain = Arc::new(Blockchain::open(&config)?);

            // Push sealed chains to stdout, the way the broadcast layer would
            let events = chain.subscribe();
            thread::spawn(move || {
                for event in events {
                    match event {
                        LedgerEvent::BlockSealed(snapshot) => match serde_json::to_string(&snapshot) {
                            Ok(body) => println!("{body}"),
                            Err(e) => error!("Failed to encode snapshot: {e}"),
                        },
                        LedgerEvent::TransactionAccepted { sender, timestamp, .. } => {
                            info!("Accepted reading from {sender} at {timestamp}")
                        }
                    }
                }
            });

            let miner = Miner::spawn(Arc::clone(&chain), config.block_interval());
            let (intake, intake_handle) = spawn_intake(Arc::clone(&chain));

            let forwarded = forward_lines(io::stdin().lock(), &intake)?;
            drop(intake);
            let accepted = intake_handle
                .join()
                .map_err(|_| BlockchainError::Io("Intake thread panicked".to_string()))?;
            info!("Input closed: {forwarded} submissions read, {accepted} accepted");

            let sealed = miner.stop();
            // Seal whatever arrived after the last miner round
            if let Some(block) = chain.create_block()? {
                info!("Sealed final block {}", block.get_index());
            }
            info!(
                "Miner sealed {sealed} blocks; chain length {}, valid: {}",
                chain.len(),
                chain.validate()
            );
        }
        Command::Mine {
            file,
            difficulty,
            config,
        } => {
            let mut config = LedgerConfig::load(config.as_deref())?;
            if let Some(difficulty) = difficulty {
                config = config.with_difficulty(difficulty);
            }
            let chain = Blockchain::open(&config)?;

            let text = fs::read_to_string(&file)?;
            let submissions: Vec<VerifiedSubmission> = serde_json::from_str(&text)?;
            for submission in submissions {
                chain.submit_json(&submission.sender, &submission.recipient, submission.payload)?;
            }

            match chain.create_block()? {
                Some(block) => println!("{}", serde_json::to_string_pretty(&block.summary())?),
                None => println!("No submissions in {}", file.display()),
            }
        }
        Command::Printchain { config } => {
            let config = LedgerConfig::load(config.as_deref())?;
            let store = open_store(&config)?;
            for block in store.load_all()? {
                println!("Block {}", block.get_index());
                println!("  Prev hash:   {}", block.get_previous_hash());
                println!("  Hash:        {}", block.get_hash());
                println!("  Merkle root: {}", block.get_merkle_root());
                println!("  Timestamp:   {}", block.get_timestamp());
                println!("  Nonce:       {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!(
                        "  - {} -> {}: {}",
                        tx.get_sender(),
                        tx.get_recipient(),
                        serde_json::to_string(tx.get_payload())?
                    );
                }
                println!();
            }
        }
        Command::Validate { config } => {
            let config = LedgerConfig::load(config.as_deref())?;
            let store = open_store(&config)?;
            let blocks = store.load_all()?;
            match audit_blocks(blocks.as_slice(), config.difficulty) {
                Ok(()) => println!("Chain valid: {} blocks", blocks.len()),
                Err(fault) => return Err(format!("Chain invalid: {fault}").into()),
            }
        }
    }
    Ok(())
}

fn open_store(config: &LedgerConfig) -> Result<BlockStore, Box<dyn std::error::Error>> {
    let path: &Path = config
        .data_dir
        .as_deref()
        .ok_or("No data_dir configured; set it in the config file or LEDGER_DATA_DIR")?;
    Ok(BlockStore::open(path)?)
}
