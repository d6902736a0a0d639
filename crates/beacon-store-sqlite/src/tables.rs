//! Record-store primitives, one module per table, all operating inside the
//! caller's transaction.
//!
//! These are the only functions that touch SQL. The public operations in
//! [`store`](crate::store) compose them; the retention collector in
//! [`retention`](crate::retention) drives them table by table.

use rusqlite::{Transaction, types::ToSql};

// ─── Keep-set deletion ───────────────────────────────────────────────────────

/// Delete every row of `table` whose `column` value is not in `keep`.
///
/// The one generic sweep primitive shared by all five tables. An empty
/// keep-set deletes every row (SQLite evaluates `NOT IN ()` as true); call
/// sites branch explicitly wherever an empty set must mean something other
/// than "keep nothing".
pub fn delete_not_in<T: ToSql>(
  tx: &Transaction<'_>,
  table: &str,
  column: &str,
  keep: &[T],
) -> rusqlite::Result<usize> {
  let placeholders = vec!["?"; keep.len()].join(", ");
  let sql =
    format!("DELETE FROM {table} WHERE {column} NOT IN ({placeholders})");
  tx.execute(&sql, rusqlite::params_from_iter(keep.iter()))
}

// ─── metadata ────────────────────────────────────────────────────────────────

pub mod metadata {
  use rusqlite::{OptionalExtension as _, Transaction};

  use crate::encode::RawMetadata;

  pub fn find_by_hash(
    tx: &Transaction<'_>,
    hash: &str,
  ) -> rusqlite::Result<Option<RawMetadata>> {
    tx.query_row(
      "SELECT metadata_id, hash, payload FROM metadata WHERE hash = ?1",
      rusqlite::params![hash],
      |row| {
        Ok(RawMetadata {
          metadata_id: row.get(0)?,
          hash:        row.get(1)?,
          payload:     row.get(2)?,
        })
      },
    )
    .optional()
  }

  pub fn insert(
    tx: &Transaction<'_>,
    hash: &str,
    payload: &str,
  ) -> rusqlite::Result<i64> {
    tx.execute(
      "INSERT INTO metadata (hash, payload) VALUES (?1, ?2)",
      rusqlite::params![hash, payload],
    )?;
    Ok(tx.last_insert_rowid())
  }

  pub fn get(
    tx: &Transaction<'_>,
    id: i64,
  ) -> rusqlite::Result<Option<RawMetadata>> {
    tx.query_row(
      "SELECT metadata_id, hash, payload FROM metadata WHERE metadata_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawMetadata {
          metadata_id: row.get(0)?,
          hash:        row.get(1)?,
          payload:     row.get(2)?,
        })
      },
    )
    .optional()
  }

  pub fn hash_for(
    tx: &Transaction<'_>,
    id: i64,
  ) -> rusqlite::Result<Option<String>> {
    tx.query_row(
      "SELECT hash FROM metadata WHERE metadata_id = ?1",
      rusqlite::params![id],
      |row| row.get(0),
    )
    .optional()
  }

  pub fn all_ids(tx: &Transaction<'_>) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = tx.prepare("SELECT metadata_id FROM metadata")?;
    let ids = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  pub fn delete_all(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM metadata", [])
  }
}

// ─── sessions ────────────────────────────────────────────────────────────────

pub mod sessions {
  use rusqlite::{OptionalExtension as _, Transaction};

  use crate::encode::RawSession;

  pub fn insert(
    tx: &Transaction<'_>,
    metadata_id: i64,
    session_key: &str,
    started_at: &str,
  ) -> rusqlite::Result<i64> {
    tx.execute(
      "INSERT INTO sessions (metadata_id, session_key, started_at)
       VALUES (?1, ?2, ?3)",
      rusqlite::params![metadata_id, session_key, started_at],
    )?;
    Ok(tx.last_insert_rowid())
  }

  pub fn get(
    tx: &Transaction<'_>,
    id: i64,
  ) -> rusqlite::Result<Option<RawSession>> {
    tx.query_row(
      "SELECT session_id, metadata_id, session_key, started_at
       FROM sessions WHERE session_id = ?1",
      rusqlite::params![id],
      |row| {
        Ok(RawSession {
          session_id:  row.get(0)?,
          metadata_id: row.get(1)?,
          session_key: row.get(2)?,
          started_at:  row.get(3)?,
        })
      },
    )
    .optional()
  }

  /// Distinct metadata ids referenced by the remaining session rows.
  pub fn metadata_ids(tx: &Transaction<'_>) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = tx.prepare("SELECT DISTINCT metadata_id FROM sessions")?;
    let ids = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  pub fn delete_expired(
    tx: &Transaction<'_>,
    cutoff: &str,
  ) -> rusqlite::Result<usize> {
    tx.execute(
      "DELETE FROM sessions WHERE started_at < ?1",
      rusqlite::params![cutoff],
    )
  }
}

// ─── tracking_urls ───────────────────────────────────────────────────────────

pub mod tracking_urls {
  use beacon_core::tracking::TrackingUrl;
  use rusqlite::Transaction;

  pub fn insert(tx: &Transaction<'_>, url: &str) -> rusqlite::Result<i64> {
    tx.execute(
      "INSERT INTO tracking_urls (url) VALUES (?1)",
      rusqlite::params![url],
    )?;
    Ok(tx.last_insert_rowid())
  }

  pub fn read_all(tx: &Transaction<'_>) -> rusqlite::Result<Vec<TrackingUrl>> {
    let mut stmt =
      tx.prepare("SELECT tracking_url_id, url FROM tracking_urls")?;
    let urls = stmt
      .query_map([], |row| {
        Ok(TrackingUrl { tracking_url_id: row.get(0)?, url: row.get(1)? })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(urls)
  }

  pub fn delete_all(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM tracking_urls", [])
  }
}

// ─── metadata_url_refs ───────────────────────────────────────────────────────

pub mod refs {
  use beacon_core::tracking::MetadataUrlRef;
  use rusqlite::Transaction;

  pub fn insert(
    tx: &Transaction<'_>,
    link: MetadataUrlRef,
  ) -> rusqlite::Result<()> {
    tx.execute(
      "INSERT INTO metadata_url_refs (tracking_url_id, metadata_id)
       VALUES (?1, ?2)",
      rusqlite::params![link.tracking_url_id, link.metadata_id],
    )?;
    Ok(())
  }

  /// Distinct tracking URL ids still linked by a surviving ref row.
  pub fn tracking_url_ids(tx: &Transaction<'_>) -> rusqlite::Result<Vec<i64>> {
    let mut stmt =
      tx.prepare("SELECT DISTINCT tracking_url_id FROM metadata_url_refs")?;
    let ids = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  pub fn delete_all(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM metadata_url_refs", [])
  }
}

// ─── events ──────────────────────────────────────────────────────────────────

pub mod events {
  use rusqlite::{OptionalExtension as _, Transaction};

  use crate::encode::{EncodedEvent, RawEvent};

  pub fn insert(
    tx: &Transaction<'_>,
    metadata_hash: &str,
    session_id: i64,
    tracking_url_id: i64,
    ev: &EncodedEvent,
  ) -> rusqlite::Result<i64> {
    tx.execute(
      "INSERT INTO events
         (metadata_hash, session_id, tracking_url_id, timestamp, event_time, fields)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![
        metadata_hash,
        session_id,
        tracking_url_id,
        ev.timestamp,
        ev.event_time,
        ev.fields,
      ],
    )?;
    Ok(tx.last_insert_rowid())
  }

  pub fn get(
    tx: &Transaction<'_>,
    event_id: i64,
  ) -> rusqlite::Result<Option<RawEvent>> {
    tx.query_row(
      "SELECT event_id, metadata_hash, session_id, tracking_url_id,
              timestamp, event_time, fields
       FROM events WHERE event_id = ?1",
      rusqlite::params![event_id],
      |row| {
        Ok(RawEvent {
          event_id:        row.get(0)?,
          metadata_hash:   row.get(1)?,
          session_id:      row.get(2)?,
          tracking_url_id: row.get(3)?,
          timestamp:       row.get(4)?,
          event_time:      row.get(5)?,
          fields:          row.get(6)?,
        })
      },
    )
    .optional()
  }

  pub fn delete_expired(
    tx: &Transaction<'_>,
    cutoff: &str,
  ) -> rusqlite::Result<usize> {
    tx.execute(
      "DELETE FROM events WHERE event_time < ?1",
      rusqlite::params![cutoff],
    )
  }

  /// Point delete by the full reporting key.
  pub fn delete_one(
    tx: &Transaction<'_>,
    tracking_url_id: i64,
    session_id: i64,
    event_id: i64,
    timestamp: i64,
  ) -> rusqlite::Result<usize> {
    tx.execute(
      "DELETE FROM events
       WHERE tracking_url_id = ?1 AND session_id = ?2
         AND event_id = ?3 AND timestamp = ?4",
      rusqlite::params![tracking_url_id, session_id, event_id, timestamp],
    )
  }

  pub fn delete_all(tx: &Transaction<'_>) -> rusqlite::Result<usize> {
    tx.execute("DELETE FROM events", [])
  }
}

// ─── reporting (cross-entity lookups) ────────────────────────────────────────

/// Joins over the events table that answer "what is still referenced".
/// These produce partial projections; canonical event rows are re-read from
/// [`events`] by id.
pub mod reporting {
  use rusqlite::Transaction;

  use crate::encode::EventKey;

  /// Distinct session ids referenced by any remaining event row.
  pub fn session_ids(tx: &Transaction<'_>) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = tx.prepare("SELECT DISTINCT session_id FROM events")?;
    let ids = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  /// Distinct session ids that reported through the given tracking URL.
  pub fn session_ids_for_url(
    tx: &Transaction<'_>,
    tracking_url_id: i64,
  ) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = tx.prepare(
      "SELECT DISTINCT session_id FROM events WHERE tracking_url_id = ?1",
    )?;
    let ids = stmt
      .query_map(rusqlite::params![tracking_url_id], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
  }

  /// Event keys for one (tracking URL, session) pair, oldest first.
  pub fn event_keys_for(
    tx: &Transaction<'_>,
    tracking_url_id: i64,
    session_id: i64,
  ) -> rusqlite::Result<Vec<EventKey>> {
    let mut stmt = tx.prepare(
      "SELECT event_id, timestamp FROM events
       WHERE tracking_url_id = ?1 AND session_id = ?2
       ORDER BY event_id",
    )?;
    let keys = stmt
      .query_map(rusqlite::params![tracking_url_id, session_id], |row| {
        Ok(EventKey { event_id: row.get(0)?, timestamp: row.get(1)? })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
  }
}
