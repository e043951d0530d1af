//! Hashing and identity primitives for itemchain

use chrono::{DateTime, SecondsFormat, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;

/// Hex-encoded SHA-256 digest of a block.
pub type BlockHash = String;

/// Number of random bytes behind every generated identifier.
const UNIQUE_ID_BYTES: usize = 16;

/// Deterministic digest over a block's canonical fields.
///
/// The timestamp is rendered with nanosecond precision and the transaction is
/// serialized in full, so two blocks that differ in any field (including the
/// sub-second part of the timestamp) hash differently.
pub fn digest(
    index: u64,
    timestamp: &DateTime<Utc>,
    prev_hash: &str,
    transaction: &Transaction,
) -> BlockHash {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(prev_hash.as_bytes());
    // Serializing a plain data enum to JSON cannot fail.
    hasher.update(serde_json::to_vec(transaction).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Fresh random identifier for items and transactions.
///
/// Uniqueness is probabilistic: 128 random bits, no coordination between nodes.
pub fn new_unique_id() -> String {
    let mut bytes = [0u8; UNIQUE_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
