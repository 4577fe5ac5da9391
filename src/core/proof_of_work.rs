use crate::core::EncodedHeader;
use crate::error::{BlockchainError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A SHA-256 hex digest has 64 characters, so no target can ask for more zeros
pub const MAX_DIFFICULTY: u32 = 64;

const DEFAULT_CHECK_INTERVAL: u64 = 4096;

/// Nonce search over a block header.
///
/// The search is unbounded by default. A cancel flag (polled every
/// `check_interval` attempts) and an attempt cap can stop it early, and an
/// optional shared counter exposes progress for monitoring.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: u32,
    cancel_flag: Option<Arc<AtomicBool>>,
    max_attempts: Option<u64>,
    check_interval: u64,
    attempt_counter: Option<Arc<AtomicU64>>,
}

/// Outcome of a successful search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seal {
    pub nonce: u64,
    pub hash: String,
    pub attempts: u64,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> ProofOfWork {
        ProofOfWork {
            difficulty,
            cancel_flag: None,
            max_attempts: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            attempt_counter: None,
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    pub fn with_attempt_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.attempt_counter = Some(counter);
        self
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    /// True when the first `difficulty` hex characters of `hash` are '0'
    pub fn meets_target(hash: &str, difficulty: u32) -> bool {
        let zeros = difficulty as usize;
        hash.len() >= zeros && hash.bytes().take(zeros).all(|b| b == b'0')
    }

    pub fn run(&self, header: &EncodedHeader) -> Result<Seal> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Mining(format!(
                "Difficulty {} exceeds the {MAX_DIFFICULTY} hex digits of a SHA-256 hash",
                self.difficulty
            )));
        }

        let mut nonce: u64 = 0;
        loop {
            if self.max_attempts.is_some_and(|cap| nonce >= cap) || self.is_cancelled(nonce) {
                return Err(BlockchainError::SealAborted { attempts: nonce });
            }

            let hash = header.hash(nonce);
            if let Some(counter) = &self.attempt_counter {
                counter.fetch_add(1, Ordering::Relaxed);
            }

            if Self::meets_target(&hash, self.difficulty) {
                return Ok(Seal {
                    nonce,
                    hash,
                    attempts: nonce + 1,
                });
            }

            nonce = nonce.checked_add(1).ok_or_else(|| {
                BlockchainError::Mining("Nonce space exhausted".to_string())
            })?;
        }
    }

    fn is_cancelled(&self, nonce: u64) -> bool {
        match &self.cancel_flag {
            Some(flag) if nonce % self.check_interval == 0 => flag.load(Ordering::Relaxed),
            _ => false,
        }
    }
}
