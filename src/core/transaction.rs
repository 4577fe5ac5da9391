// This file implements the ledger's transaction record - one verified device reading
// The ledger trusts that sender and payload were already checked by the auth layer,
// so a transaction here is just an immutable, canonically hashable record

use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_json, ensure_finite, sha256_hex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque device payload. A BTreeMap keeps key order stable for hashing.
pub type Payload = BTreeMap<String, Value>;

// I declare the fields in alphabetical order so the derived encoding is the
// same as the sorted-key form of the transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    payload: Payload,
    recipient: String,
    sender: String,
    timestamp: f64,
}

impl Transaction {
    pub fn new(sender: &str, recipient: &str, timestamp: f64, payload: Payload) -> Result<Transaction> {
        // A NaN or infinite timestamp would encode as `null` and hash ambiguously
        if !timestamp.is_finite() {
            return Err(BlockchainError::MalformedPayload(format!(
                "Transaction timestamp must be finite, got {timestamp}"
            )));
        }

        Ok(Transaction {
            payload,
            recipient: recipient.to_string(),
            sender: sender.to_string(),
            timestamp,
        })
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn get_payload(&self) -> &Payload {
        &self.payload
    }

    /// Canonical bytes of this transaction (sorted keys, compact)
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_json(self)
    }

    /// Merkle leaf: SHA-256 of the canonical encoding, hex encoded
    pub fn leaf_hash(&self) -> Result<String> {
        Ok(sha256_hex(&self.canonical_bytes()?))
    }

    #[cfg(test)]
    pub(crate) fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

/// Turn an arbitrary JSON value into a payload. Only objects are accepted.
pub fn payload_from_value(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(BlockchainError::MalformedPayload(format!(
            "Payload must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Parse payload JSON text
pub fn payload_from_str(text: &str) -> Result<Payload> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| BlockchainError::MalformedPayload(format!("Invalid payload JSON: {e}")))?;
    payload_from_value(value)
}

/// Convert any serializable value (struct, map) into a payload
pub fn payload_from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Payload> {
    // to_value would silently store NaN and infinities as null
    ensure_finite(data)
        .map_err(|e| BlockchainError::MalformedPayload(format!("Payload not representable: {e}")))?;
    // serde_json refuses maps with non-string keys here
    let value = serde_json::to_value(data)
        .map_err(|e| BlockchainError::MalformedPayload(format!("Payload not serializable: {e}")))?;
    payload_from_value(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn reading(t: i64) -> Payload {
        payload_from_value(json!({ "t": t })).unwrap()
    }

    #[test]
    fn test_canonical_encoding_sorts_fields() {
        let payload = payload_from_value(json!({"temp": 21.5, "humidity": 40})).unwrap();
        let tx = Transaction::new("dev1", "network", 1700000000.5, payload).unwrap();

        let encoded = String::from_utf8(tx.canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            encoded,
            r#"{"payload":{"humidity":40,"temp":21.5},"recipient":"network","sender":"dev1","timestamp":1700000000.5}"#
        );
    }

    #[test]
    fn test_struct_encoding_matches_sorted_value_encoding() {
        let tx = Transaction::new("dev1", "network", 12.25, reading(1)).unwrap();
        let as_value = serde_json::to_value(&tx).unwrap();
        assert_eq!(
            tx.canonical_bytes().unwrap(),
            serde_json::to_vec(&as_value).unwrap()
        );
    }

    #[test]
    fn test_leaf_hash_is_deterministic() {
        let tx = Transaction::new("dev1", "network", 1.0, reading(1)).unwrap();
        assert_eq!(tx.leaf_hash().unwrap(), tx.clone().leaf_hash().unwrap());
        assert_eq!(tx.leaf_hash().unwrap().len(), 64);
    }

    #[test]
    fn test_leaf_hash_changes_with_payload() {
        let a = Transaction::new("dev1", "network", 1.0, reading(1)).unwrap();
        let b = Transaction::new("dev1", "network", 1.0, reading(2)).unwrap();
        assert_ne!(a.leaf_hash().unwrap(), b.leaf_hash().unwrap());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let err = payload_from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedPayload(_)));

        let err = payload_from_str("not json").unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedPayload(_)));
    }

    #[test]
    fn test_non_string_keys_are_rejected() {
        let mut readings: HashMap<(u8, u8), i32> = HashMap::new();
        readings.insert((1, 2), 3);
        let err = payload_from_serialize(&readings).unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedPayload(_)));
    }

    #[test]
    fn test_non_finite_readings_are_rejected() {
        let mut readings: BTreeMap<&str, f64> = BTreeMap::new();
        readings.insert("temp", f64::NAN);
        let err = payload_from_serialize(&readings).unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedPayload(_)));

        readings.insert("temp", f64::NEG_INFINITY);
        assert!(payload_from_serialize(&readings).is_err());

        readings.insert("temp", 21.5);
        let payload = payload_from_serialize(&readings).unwrap();
        assert_eq!(payload["temp"], json!(21.5));
    }

    #[test]
    fn test_non_finite_timestamp_is_rejected() {
        let err = Transaction::new("dev1", "network", f64::NAN, reading(1)).unwrap_err();
        assert!(matches!(err, BlockchainError::MalformedPayload(_)));
    }
}
