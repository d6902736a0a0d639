//! Error type for `beacon-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The connection behind the handle has been closed; no operation can
  /// run until a new store is opened.
  #[error("store unavailable: connection closed")]
  Unavailable,

  /// A step of a transaction failed. The whole transaction was rolled
  /// back; no partial effects are visible.
  #[error("transaction failed: {0}")]
  Transaction(#[source] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Attempted to append events to a session that no longer exists.
  #[error("session not found: {0}")]
  SessionNotFound(i64),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::ConnectionClosed => Error::Unavailable,
      tokio_rusqlite::Error::Rusqlite(e) => Error::Transaction(e),
      tokio_rusqlite::Error::Close((_, e)) => Error::Transaction(e),
      _ => Error::Unavailable,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
