//! SQL schema for the beacon SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Cross-table references (`sessions.metadata_id`, `events.metadata_hash`,
/// the ref rows) are deliberately not FOREIGN KEYs: the retention collector
/// owns referential integrity, and the persist path writes the tables in an
/// order an enforced constraint graph would reject.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS metadata (
    metadata_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    hash         TEXT NOT NULL UNIQUE,  -- SHA-256 hex of payload; the dedup key
    payload      TEXT NOT NULL          -- JSON descriptive fields
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    metadata_id  INTEGER NOT NULL,      -- references metadata(metadata_id) by convention
    session_key  TEXT NOT NULL,         -- client-generated UUID
    started_at   TEXT NOT NULL          -- ISO 8601 UTC; store-assigned
);

CREATE TABLE IF NOT EXISTS tracking_urls (
    tracking_url_id INTEGER PRIMARY KEY AUTOINCREMENT,
    url             TEXT NOT NULL       -- never deduplicated
);

-- Pure join rows; no identifier of their own.
CREATE TABLE IF NOT EXISTS metadata_url_refs (
    tracking_url_id INTEGER NOT NULL,
    metadata_id     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    event_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    metadata_hash   TEXT NOT NULL,
    session_id      INTEGER NOT NULL,
    tracking_url_id INTEGER NOT NULL,
    timestamp       INTEGER NOT NULL,   -- media offset, milliseconds
    event_time      TEXT NOT NULL,      -- ISO 8601 UTC; drives expiry
    fields          TEXT NOT NULL       -- JSON reporting fields
);

CREATE INDEX IF NOT EXISTS events_hash_idx   ON events(metadata_hash);
CREATE INDEX IF NOT EXISTS events_report_idx ON events(tracking_url_id, session_id, event_id, timestamp);
CREATE INDEX IF NOT EXISTS sessions_meta_idx ON sessions(metadata_id);

PRAGMA user_version = 1;
";
