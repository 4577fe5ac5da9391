//! Utility functions and helpers
//!
//! Hashing, timestamps and the canonical JSON encoding that feeds every hash.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, sha256_hex};

pub use serialization::{canonical_json, canonical_string, ensure_finite};
