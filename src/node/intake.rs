// Message-passing seam between the authentication layer and the ledger
// The auth side sends submissions it has already verified; one consumer
// thread turns them into submit_transaction calls

use crate::core::Blockchain;
use crate::error::{BlockchainError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Recipient used by devices reporting to the network itself
pub const NETWORK_RECIPIENT: &str = "network";

/// A submission whose sender identity and payload signature were verified upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedSubmission {
    pub sender: String,
    #[serde(default = "default_recipient")]
    pub recipient: String,
    pub payload: Value,
}

fn default_recipient() -> String {
    NETWORK_RECIPIENT.to_string()
}

/// Start the intake thread. It runs until every sender is dropped and then
/// returns how many submissions the chain accepted.
pub fn spawn_intake(chain: Arc<Blockchain>) -> (Sender<VerifiedSubmission>, JoinHandle<usize>) {
    let (tx, rx) = channel::<VerifiedSubmission>();
    let handle = thread::spawn(move || {
        let mut accepted = 0;
        for submission in rx {
            match chain.submit_json(&submission.sender, &submission.recipient, submission.payload) {
                Ok(_) => accepted += 1,
                Err(e) => warn!("Rejected submission from {}: {e}", submission.sender),
            }
        }
        debug!("Intake closed after {accepted} submissions");
        accepted
    });
    (tx, handle)
}

/// Forward JSON-lines submissions from `reader` into the intake channel.
/// Blank lines are skipped and unparseable lines are logged and skipped.
pub fn forward_lines<R: BufRead>(reader: R, intake: &Sender<VerifiedSubmission>) -> Result<usize> {
    let mut forwarded = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<VerifiedSubmission>(&line) {
            Ok(submission) => {
                intake.send(submission).map_err(|_| {
                    BlockchainError::Io("Intake channel closed".to_string())
                })?;
                forwarded += 1;
            }
            Err(e) => warn!("Skipping unreadable submission: {e}"),
        }
    }
    Ok(forwarded)
}
