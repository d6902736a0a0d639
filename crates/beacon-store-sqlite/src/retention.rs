//! The retention collector — reachability-based deletion across all five
//! tables.
//!
//! One pass walks the reference chain downstream: events anchor sessions,
//! sessions anchor metadata, metadata anchors ref rows, ref rows anchor
//! tracking URLs. Whatever falls off the chain is reclaimed, except rows
//! reachable from the pinned aggregate.

use beacon_core::report::ReportingData;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Transaction;

use crate::{
  encode::encode_dt,
  tables::{self, delete_not_in},
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Time-to-live configuration applied by a collection pass.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
  /// Events older than this are reclaimed unconditionally, pinned or not.
  pub event_ttl:   Duration,
  /// Sessions older than this may be reclaimed once no event references
  /// them.
  pub session_ttl: Duration,
}

impl Default for RetentionPolicy {
  fn default() -> Self {
    Self {
      event_ttl:   Duration::days(14),
      session_ttl: Duration::hours(24),
    }
  }
}

// ─── Collection pass ─────────────────────────────────────────────────────────

/// Run one full pass inside the caller's transaction. Returns the number of
/// rows reclaimed.
///
/// Ordering matters: each sweep derives its live set from the survivors of
/// the previous one, so reordering the steps would orphan rows the next
/// pass could never reach again.
pub fn run(
  tx: &Transaction<'_>,
  pinned: Option<&ReportingData>,
  policy: RetentionPolicy,
  now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
  let mut reclaimed = 0;

  // 1. Expired events go first, regardless of the pin.
  reclaimed +=
    tables::events::delete_expired(tx, &encode_dt(now - policy.event_ttl))?;

  // 2. Sessions referenced by a remaining event survive, as does the
  //    pinned session.
  let mut live_sessions = tables::reporting::session_ids(tx)?;
  if let Some(pin) = pinned {
    let id = pin.session.session_id;
    if !live_sessions.contains(&id) {
      live_sessions.push(id);
    }
  }
  if live_sessions.is_empty() {
    // No event anchors any session, but that is not "delete everything":
    // eventless sessions only fall to their own TTL.
    reclaimed += tables::sessions::delete_expired(
      tx,
      &encode_dt(now - policy.session_ttl),
    )?;
  } else {
    reclaimed += delete_not_in(tx, "sessions", "session_id", &live_sessions)?;
  }

  // 3. Metadata anchored by a surviving session, or by the pin.
  let mut live_metadata = tables::sessions::metadata_ids(tx)?;
  if let Some(pin) = pinned {
    let id = pin.metadata.metadata_id;
    if !live_metadata.contains(&id) {
      live_metadata.push(id);
    }
  }
  if live_metadata.is_empty() {
    // No session survives to anchor any metadata; metadata and the events
    // keyed to its hashes are fully reclaimed.
    reclaimed += tables::metadata::delete_all(tx)?;
    reclaimed += tables::events::delete_all(tx)?;
  } else {
    reclaimed += delete_not_in(tx, "metadata", "metadata_id", &live_metadata)?;
    let mut live_hashes = Vec::with_capacity(live_metadata.len() + 1);
    for id in &live_metadata {
      if let Some(hash) = tables::metadata::hash_for(tx, *id)? {
        live_hashes.push(hash);
      }
    }
    // A pin that was never persisted has no row to resolve; its hash still
    // protects its events.
    if let Some(pin) = pinned {
      if !live_hashes.contains(&pin.metadata.hash) {
        live_hashes.push(pin.metadata.hash.clone());
      }
    }
    reclaimed += delete_not_in(tx, "events", "metadata_hash", &live_hashes)?;
  }

  // 4. Ref rows follow metadata.
  let remaining_metadata = tables::metadata::all_ids(tx)?;
  if remaining_metadata.is_empty() {
    reclaimed += tables::refs::delete_all(tx)?;
  } else {
    reclaimed += delete_not_in(
      tx,
      "metadata_url_refs",
      "metadata_id",
      &remaining_metadata,
    )?;
  }

  // 5. Tracking URLs follow the surviving refs, plus the pin's own.
  let mut live_urls = tables::refs::tracking_url_ids(tx)?;
  if let Some(pin) = pinned {
    for url in &pin.tracking_urls {
      if !live_urls.contains(&url.tracking_url_id) {
        live_urls.push(url.tracking_url_id);
      }
    }
  }
  if live_urls.is_empty() {
    reclaimed += tables::tracking_urls::delete_all(tx)?;
  } else {
    reclaimed +=
      delete_not_in(tx, "tracking_urls", "tracking_url_id", &live_urls)?;
  }

  Ok(reclaimed)
}
