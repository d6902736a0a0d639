//! SQLite backend for the beacon telemetry store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. That thread doubles as the
//! store's mutual-exclusion boundary: every public operation is a single
//! closure on it, containing exactly one transaction.

mod encode;
mod retention;
mod schema;
mod store;
mod tables;

pub mod error;

pub use error::{Error, Result};
pub use retention::RetentionPolicy;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
