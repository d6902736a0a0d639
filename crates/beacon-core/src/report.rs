//! The `ReportingData` aggregate — the unit of write, read, and deletion.

use serde::{Deserialize, Serialize};

use crate::{
  event::{Event, NewEvent},
  metadata::{Metadata, NewMetadata},
  session::{NewSession, Session},
  tracking::{NewTrackingUrl, TrackingUrl},
};

/// An unpersisted batch: one metadata snapshot, one session, the URLs to
/// report to, and the events produced so far.
#[derive(Debug, Clone)]
pub struct NewReport {
  pub metadata:      NewMetadata,
  pub session:       NewSession,
  pub tracking_urls: Vec<NewTrackingUrl>,
  pub events:        Vec<NewEvent>,
}

/// A fully persisted aggregate; every nested entity carries its
/// store-assigned identifier.
///
/// Passed to [`ReportStore::collect`](crate::store::ReportStore::collect) as
/// the pin, it is the collector's root set: nothing reachable from it is
/// reclaimed, even if the aggregate itself was never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingData {
  pub metadata:      Metadata,
  pub session:       Session,
  pub tracking_urls: Vec<TrackingUrl>,
  pub events:        Vec<Event>,
}
