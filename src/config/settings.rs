use crate::core::MAX_DIFFICULTY;
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const BLOCK_INTERVAL_KEY: &str = "LEDGER_BLOCK_INTERVAL";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";

const DEFAULT_DIFFICULTY: u32 = 4;
const DEFAULT_BLOCK_INTERVAL_SECS: u64 = 10;
const DEFAULT_CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Settings for one ledger node. Missing file keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every block hash
    pub difficulty: u32,
    /// Seconds between miner rounds
    pub block_interval_secs: u64,
    /// Where sealed blocks are persisted; memory only when unset
    pub data_dir: Option<PathBuf>,
    /// Give up sealing after this many attempts
    pub max_seal_attempts: Option<u64>,
    /// Attempts between polls of the seal cancel flag
    pub cancel_check_interval: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_DIFFICULTY,
            block_interval_secs: DEFAULT_BLOCK_INTERVAL_SECS,
            data_dir: None,
            max_seal_attempts: None,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl LedgerConfig {
    /// Defaults, then the TOML file if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<LedgerConfig> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => LedgerConfig::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<LedgerConfig> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<LedgerConfig> {
        let config: LedgerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_secs(self.block_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "difficulty {} exceeds {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        if self.max_seal_attempts == Some(0) {
            return Err(BlockchainError::Config(
                "max_seal_attempts must be positive when set".to_string(),
            ));
        }
        if self.cancel_check_interval == 0 {
            return Err(BlockchainError::Config(
                "cancel_check_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var(DIFFICULTY_KEY) {
            self.difficulty = parse_env(DIFFICULTY_KEY, &value)?;
        }
        if let Ok(value) = env::var(BLOCK_INTERVAL_KEY) {
            self.block_interval_secs = parse_env(BLOCK_INTERVAL_KEY, &value)?;
        }
        if let Ok(value) = env::var(DATA_DIR_KEY) {
            self.data_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BlockchainError::Config(format!("Invalid value for {key}: {value}")))
}
