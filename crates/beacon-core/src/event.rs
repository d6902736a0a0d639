//! Tracking events — the rows the store exists to hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event not yet persisted. The session, tracking URL, and metadata hash
/// are stamped by the store during the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
  /// Position in the media stream, in milliseconds.
  pub timestamp:  i64,
  /// Wall-clock occurrence; drives event expiry.
  pub event_time: DateTime<Utc>,
  /// Free-form reporting fields, forwarded verbatim to tracking endpoints.
  pub fields:     serde_json::Value,
}

/// A persisted event row, denormalized onto one (tracking URL, session)
/// pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub event_id:        i64,
  /// Hash of the owning metadata; the collector cascades deletions by it.
  pub metadata_hash:   String,
  pub session_id:      i64,
  pub tracking_url_id: i64,
  pub timestamp:       i64,
  pub event_time:      DateTime<Utc>,
  pub fields:          serde_json::Value,
}
