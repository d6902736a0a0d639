//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed `+00:00` offset,
//! so string comparison in SQL matches chronological order. Structured
//! payloads are compact JSON. Session keys are hyphenated lowercase UUID
//! strings.

use beacon_core::{
  event::{Event, NewEvent},
  metadata::Metadata,
  session::Session,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Pre-encoded inputs ──────────────────────────────────────────────────────

/// A [`NewEvent`] with its column values rendered, ready to move into the
/// connection closure.
pub struct EncodedEvent {
  pub timestamp:  i64,
  pub event_time: String,
  pub fields:     String,
}

pub fn encode_event(ev: &NewEvent) -> EncodedEvent {
  EncodedEvent {
    timestamp:  ev.timestamp,
    event_time: encode_dt(ev.event_time),
    fields:     ev.fields.to_string(),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `metadata` row.
pub struct RawMetadata {
  pub metadata_id: i64,
  pub hash:        String,
  pub payload:     String,
}

impl RawMetadata {
  pub fn into_metadata(self) -> Result<Metadata> {
    Ok(Metadata {
      metadata_id: self.metadata_id,
      hash:        self.hash,
      payload:     serde_json::from_str(&self.payload)?,
    })
  }
}

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:  i64,
  pub metadata_id: i64,
  pub session_key: String,
  pub started_at:  String,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id:  self.session_id,
      metadata_id: self.metadata_id,
      session_key: decode_uuid(&self.session_key)?,
      started_at:  decode_dt(&self.started_at)?,
    })
  }
}

/// Raw strings read directly from an `events` row.
pub struct RawEvent {
  pub event_id:        i64,
  pub metadata_hash:   String,
  pub session_id:      i64,
  pub tracking_url_id: i64,
  pub timestamp:       i64,
  pub event_time:      String,
  pub fields:          String,
}

impl RawEvent {
  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:        self.event_id,
      metadata_hash:   self.metadata_hash,
      session_id:      self.session_id,
      tracking_url_id: self.tracking_url_id,
      timestamp:       self.timestamp,
      event_time:      decode_dt(&self.event_time)?,
      fields:          serde_json::from_str(&self.fields)?,
    })
  }
}

/// The partial projection produced by the reporting lookups; canonical
/// time and fields are re-read from the events table by id.
pub struct EventKey {
  pub event_id:  i64,
  pub timestamp: i64,
}
