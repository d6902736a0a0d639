//! Session — one playback episode, tied to the metadata snapshot that was
//! current when it started.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A session not yet persisted. Identity and start time are assigned by the
/// store at insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
  /// Client-generated identity carried on reporting requests.
  pub session_key: Uuid,
}

impl NewSession {
  pub fn new() -> Self {
    Self { session_key: Uuid::new_v4() }
  }
}

impl Default for NewSession {
  fn default() -> Self { Self::new() }
}

/// A persisted session row.
///
/// `metadata_id` references a metadata row by convention only — the store
/// does not enforce it, the retention collector honors it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:  i64,
  pub metadata_id: i64,
  pub session_key: Uuid,
  /// Store-assigned at insert; drives session expiry.
  pub started_at:  DateTime<Utc>,
}
