//! [`SqliteStore`] — the SQLite implementation of [`ReportStore`].

use std::path::Path;

use beacon_core::{
  event::{Event, NewEvent},
  report::{NewReport, ReportingData},
  session::Session,
  store::ReportStore,
  tracking::{MetadataUrlRef, TrackingUrl},
};
use chrono::Utc;
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawEvent, RawMetadata, encode_dt, encode_event, encode_uuid},
  retention::{self, RetentionPolicy},
  schema::SCHEMA,
  tables,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A beacon telemetry store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All clones
/// share one dedicated database thread, which serializes every operation;
/// each public method below runs as exactly one transaction on it.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  policy:          RetentionPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    policy: RetentionPolicy,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(policy: RetentionPolicy) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close this handle's connection. Clones of the handle observe
  /// [`Error::Unavailable`] on their next operation.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ReportStore impl ────────────────────────────────────────────────────────

impl ReportStore for SqliteStore {
  type Error = Error;

  async fn persist(&self, report: NewReport) -> Result<ReportingData> {
    let hash = report.metadata.content_hash();
    let payload_str = report.metadata.payload.to_string();
    let session_key = report.session.session_key;
    let session_key_str = encode_uuid(session_key);
    let started_at = Utc::now();
    let started_at_str = encode_dt(started_at);
    let urls: Vec<String> =
      report.tracking_urls.iter().map(|u| u.url.clone()).collect();
    let events: Vec<_> = report.events.iter().map(encode_event).collect();

    let (raw_meta, session_id, stored_urls, raw_events) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // 1. Resolve metadata by content hash: reuse or insert.
        let meta = match tables::metadata::find_by_hash(&tx, &hash)? {
          Some(row) => row,
          None => {
            let id = tables::metadata::insert(&tx, &hash, &payload_str)?;
            RawMetadata {
              metadata_id: id,
              hash:        hash.clone(),
              payload:     payload_str.clone(),
            }
          }
        };

        // 2. Tracking URLs always get fresh rows.
        let mut stored_urls = Vec::with_capacity(urls.len());
        for url in &urls {
          let id = tables::tracking_urls::insert(&tx, url)?;
          stored_urls
            .push(TrackingUrl { tracking_url_id: id, url: url.clone() });
        }

        // 3. Link each URL to the metadata snapshot.
        for url in &stored_urls {
          tables::refs::insert(&tx, MetadataUrlRef {
            tracking_url_id: url.tracking_url_id,
            metadata_id:     meta.metadata_id,
          })?;
        }

        // 4. Session stamped with the resolved metadata id.
        let session_id = tables::sessions::insert(
          &tx,
          meta.metadata_id,
          &session_key_str,
          &started_at_str,
        )?;

        // 5. Events tagged with the metadata hash, fanned out per URL.
        let mut raw_events = Vec::with_capacity(events.len() * urls.len());
        for url in &stored_urls {
          for ev in &events {
            let event_id = tables::events::insert(
              &tx,
              &meta.hash,
              session_id,
              url.tracking_url_id,
              ev,
            )?;
            raw_events.push(RawEvent {
              event_id,
              metadata_hash: meta.hash.clone(),
              session_id,
              tracking_url_id: url.tracking_url_id,
              timestamp: ev.timestamp,
              event_time: ev.event_time.clone(),
              fields: ev.fields.clone(),
            });
          }
        }

        tx.commit()?;
        Ok((meta, session_id, stored_urls, raw_events))
      })
      .await?;

    let metadata = raw_meta.into_metadata()?;
    let session = Session {
      session_id,
      metadata_id: metadata.metadata_id,
      session_key,
      started_at,
    };
    let events = raw_events
      .into_iter()
      .map(RawEvent::into_event)
      .collect::<Result<Vec<_>>>()?;

    debug!(
      metadata_id = metadata.metadata_id,
      session_id,
      events = events.len(),
      "persisted reporting batch"
    );

    Ok(ReportingData {
      metadata,
      session,
      tracking_urls: stored_urls,
      events,
    })
  }

  async fn append_events(
    &self,
    session_id: i64,
    tracking_urls: Vec<TrackingUrl>,
    events: Vec<NewEvent>,
  ) -> Result<Vec<Event>> {
    let url_ids: Vec<i64> =
      tracking_urls.iter().map(|u| u.tracking_url_id).collect();
    let encoded: Vec<_> = events.iter().map(encode_event).collect();

    // `None` out of the closure means the session (or its metadata) is
    // gone; mapped to an error once back on the caller's side.
    let raws: Option<Vec<RawEvent>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(session) = tables::sessions::get(&tx, session_id)? else {
          return Ok(None);
        };
        let Some(hash) =
          tables::metadata::hash_for(&tx, session.metadata_id)?
        else {
          return Ok(None);
        };

        let mut raws = Vec::with_capacity(encoded.len() * url_ids.len());
        for url_id in &url_ids {
          for ev in &encoded {
            let event_id =
              tables::events::insert(&tx, &hash, session_id, *url_id, ev)?;
            raws.push(RawEvent {
              event_id,
              metadata_hash: hash.clone(),
              session_id,
              tracking_url_id: *url_id,
              timestamp: ev.timestamp,
              event_time: ev.event_time.clone(),
              fields: ev.fields.clone(),
            });
          }
        }

        tx.commit()?;
        Ok(Some(raws))
      })
      .await?;

    let raws = raws.ok_or(Error::SessionNotFound(session_id))?;
    let appended = raws
      .into_iter()
      .map(RawEvent::into_event)
      .collect::<Result<Vec<_>>>()?;

    debug!(session_id, events = appended.len(), "appended events");
    Ok(appended)
  }

  async fn collect(&self, pinned: Option<ReportingData>) -> Result<()> {
    let policy = self.policy;
    let now = Utc::now();

    let reclaimed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let reclaimed = retention::run(&tx, pinned.as_ref(), policy, now)?;
        tx.commit()?;
        Ok(reclaimed)
      })
      .await?;

    debug!(rows = reclaimed, "collection pass complete");
    Ok(())
  }

  async fn list_all(&self) -> Result<Vec<ReportingData>> {
    let raws = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;

        let mut out = Vec::new();
        for url in tables::tracking_urls::read_all(&tx)? {
          for session_id in
            tables::reporting::session_ids_for_url(&tx, url.tracking_url_id)?
          {
            let mut raw_events = Vec::new();
            for key in tables::reporting::event_keys_for(
              &tx,
              url.tracking_url_id,
              session_id,
            )? {
              // The projection carries only the reporting key; canonical
              // time and fields come from the events table.
              if let Some(mut raw) = tables::events::get(&tx, key.event_id)? {
                raw.timestamp = key.timestamp;
                raw_events.push(raw);
              }
            }

            // A vanished session or metadata row lost a race with a
            // collection pass; skip the aggregate, not the whole read.
            let Some(raw_session) = tables::sessions::get(&tx, session_id)?
            else {
              continue;
            };
            let Some(raw_meta) =
              tables::metadata::get(&tx, raw_session.metadata_id)?
            else {
              continue;
            };

            out.push((url.clone(), raw_session, raw_meta, raw_events));
          }
        }

        tx.commit()?;
        Ok(out)
      })
      .await?;

    let mut reports = Vec::with_capacity(raws.len());
    for (url, raw_session, raw_meta, raw_events) in raws {
      reports.push(ReportingData {
        metadata:      raw_meta.into_metadata()?,
        session:       raw_session.into_session()?,
        tracking_urls: vec![url],
        events:        raw_events
          .into_iter()
          .map(RawEvent::into_event)
          .collect::<Result<Vec<_>>>()?,
      });
    }

    debug!(aggregates = reports.len(), "assembled reporting data");
    Ok(reports)
  }

  async fn delete(&self, report: ReportingData) -> Result<()> {
    // Events are keyed by the aggregate's first tracking URL and its
    // session; an aggregate without URLs holds no deletable rows.
    let Some(url) = report.tracking_urls.first() else {
      return Ok(());
    };
    let tracking_url_id = url.tracking_url_id;
    let session_id = report.session.session_id;
    let keys: Vec<(i64, i64)> =
      report.events.iter().map(|e| (e.event_id, e.timestamp)).collect();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for (event_id, timestamp) in keys {
          removed += tables::events::delete_one(
            &tx,
            tracking_url_id,
            session_id,
            event_id,
            timestamp,
          )?;
        }
        tx.commit()?;
        Ok(removed)
      })
      .await?;

    debug!(session_id, rows = removed, "deleted exported events");
    Ok(())
  }
}
