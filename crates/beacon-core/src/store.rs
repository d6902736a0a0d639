//! The `ReportStore` trait — the public contract of the telemetry store.
//!
//! The trait is implemented by storage backends (e.g. `beacon-store-sqlite`).
//! The producer layer calls `persist`/`append_events`, the upload layer calls
//! `list_all`/`delete`, and the embedding application runs `collect`
//! opportunistically, pinning whatever aggregate it is about to use next.
//!
//! Every operation acquires exclusive access to the store for its full
//! duration and runs as one atomic transaction: a failure rolls back all of
//! that operation's effects, and a concurrent caller sees the store state
//! entirely before or entirely after it.

use std::future::Future;

use crate::{
  event::{Event, NewEvent},
  report::{NewReport, ReportingData},
  tracking::TrackingUrl,
};

/// Abstraction over a beacon telemetry store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ReportStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist an aggregate, allocating and propagating identifiers across
  /// all five tables.
  ///
  /// Metadata is resolved by content hash (an existing row with the same
  /// hash is reused), tracking URLs always get fresh rows, each URL is
  /// linked to the metadata snapshot, the session is stamped with the
  /// resolved metadata id, and the events are tagged with the metadata
  /// hash and fanned out per tracking URL. Returns the aggregate with
  /// every nested entity carrying its store-assigned identifier.
  fn persist(
    &self,
    report: NewReport,
  ) -> impl Future<Output = Result<ReportingData, Self::Error>> + Send + '_;

  /// Persist additional events for an already-existing session, fanned out
  /// over the given (already persisted) tracking URLs.
  ///
  /// The session's metadata hash is resolved inside the transaction; no
  /// metadata, session, or ref rows are touched. Errors if the session no
  /// longer exists.
  fn append_events(
    &self,
    session_id: i64,
    tracking_urls: Vec<TrackingUrl>,
    events: Vec<NewEvent>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  // ── Retention ─────────────────────────────────────────────────────────

  /// Run one reachability-based collection pass.
  ///
  /// Expired events are reclaimed first, unconditionally; everything else
  /// survives only while reachable from a remaining event, a remaining
  /// session, or the `pinned` aggregate. Rows reachable from `pinned` are
  /// never deleted, even when `pinned` was never persisted.
  fn collect(
    &self,
    pinned: Option<ReportingData>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Reassemble every stored aggregate, one per (tracking URL, session)
  /// pair, in a single consistent snapshot.
  ///
  /// An aggregate whose session vanished between lookups (a concurrent
  /// collection pass) is skipped rather than failing the read.
  fn list_all(
    &self,
  ) -> impl Future<Output = Result<Vec<ReportingData>, Self::Error>> + Send + '_;

  // ── Point deletion ────────────────────────────────────────────────────

  /// Delete exactly the aggregate's event rows, keyed by its first
  /// tracking URL and its session. Used after a successful export, when
  /// the caller wants the data gone regardless of reachability; the
  /// remaining session/metadata/URL rows fall to the next collection pass.
  fn delete(
    &self,
    report: ReportingData,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
