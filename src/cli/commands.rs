use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "device-ledger", about = "Append-only ledger for verified device readings")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        name = "run",
        about = "Read verified submissions as JSON lines on stdin and mine them periodically"
    )]
    Run {
        #[arg(long, help = "Path to a TOML config file")]
        config: Option<PathBuf>,
    },
    #[command(name = "mine", about = "Submit a JSON array of submissions and seal one block")]
    Mine {
        #[arg(long, help = "JSON file holding an array of {sender, recipient, payload}")]
        file: PathBuf,
        #[arg(long, help = "Override the configured difficulty")]
        difficulty: Option<u32>,
        #[arg(long, help = "Path to a TOML config file")]
        config: Option<PathBuf>,
    },
    #[command(name = "printchain", about = "Print all blocks in the persisted chain")]
    Printchain {
        #[arg(long, help = "Path to a TOML config file")]
        config: Option<PathBuf>,
    },
    #[command(name = "validate", about = "Audit the persisted chain")]
    Validate {
        #[arg(long, help = "Path to a TOML config file")]
        config: Option<PathBuf>,
    },
}
