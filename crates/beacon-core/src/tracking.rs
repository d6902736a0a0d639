//! Tracking URLs and the join rows linking them to metadata snapshots.

use serde::{Deserialize, Serialize};

/// A tracking URL not yet persisted. URLs are never deduplicated: equal
/// contents still get fresh rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackingUrl {
  pub url: String,
}

impl NewTrackingUrl {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url: url.into() }
  }
}

/// A persisted tracking URL row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUrl {
  pub tracking_url_id: i64,
  pub url:             String,
}

/// Pure join row: this tracking URL was associated with this metadata
/// snapshot. Carries no identifier of its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetadataUrlRef {
  pub tracking_url_id: i64,
  pub metadata_id:     i64,
}
