//! Build/runtime metadata — the deduplicated snapshot shared by the sessions
//! and events it produced.
//!
//! Metadata rows are keyed by a content fingerprint of their descriptive
//! fields. Persisting the same payload twice yields the same row; the store
//! never holds two rows with the same hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Descriptive fields for a metadata snapshot, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetadata {
  /// Structured descriptive fields (app version, OS, device model, …).
  pub payload: serde_json::Value,
}

impl NewMetadata {
  pub fn new(payload: serde_json::Value) -> Self { Self { payload } }

  /// Content fingerprint of the payload; the dedup key.
  ///
  /// serde_json orders map keys, so equal payloads produce equal digests
  /// regardless of how the caller assembled them.
  pub fn content_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A persisted metadata row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
  pub metadata_id: i64,
  /// SHA-256 hex digest of the payload; unique within the table.
  pub hash:        String,
  pub payload:     serde_json::Value,
}
