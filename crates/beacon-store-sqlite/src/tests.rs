//! Integration tests for `SqliteStore` against an in-memory database.

use beacon_core::{
  event::NewEvent,
  metadata::{Metadata, NewMetadata},
  report::{NewReport, ReportingData},
  session::{NewSession, Session},
  store::ReportStore,
  tracking::{NewTrackingUrl, TrackingUrl},
};
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, RetentionPolicy, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(RetentionPolicy::default())
    .await
    .expect("in-memory store")
}

/// TTLs of zero: everything written before a collection pass reads the
/// clock counts as expired.
async fn zero_ttl_store() -> SqliteStore {
  SqliteStore::open_in_memory(RetentionPolicy {
    event_ttl:   Duration::zero(),
    session_ttl: Duration::zero(),
  })
  .await
  .expect("in-memory store")
}

fn sample_report(
  channel: &str,
  urls: &[&str],
  events: Vec<NewEvent>,
) -> NewReport {
  NewReport {
    metadata: NewMetadata::new(json!({
      "app_version": "2.4.1",
      "os":          "android",
      "channel":     channel,
    })),
    session: NewSession::new(),
    tracking_urls: urls.iter().map(|u| NewTrackingUrl::new(*u)).collect(),
    events,
  }
}

fn event_at(offset_ms: i64) -> NewEvent {
  NewEvent {
    timestamp:  offset_ms,
    event_time: Utc::now(),
    fields:     json!({"type": "impression"}),
  }
}

async fn count(s: &SqliteStore, table: &str) -> i64 {
  let sql = format!("SELECT COUNT(*) FROM {table}");
  s.conn
    .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get::<_, i64>(0))?))
    .await
    .expect("count")
}

async fn ids(s: &SqliteStore, table: &str, column: &str) -> Vec<i64> {
  let sql = format!("SELECT {column} FROM {table} ORDER BY {column}");
  s.conn
    .call(move |conn| {
      let mut stmt = conn.prepare(&sql)?;
      let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
      Ok(ids)
    })
    .await
    .expect("ids")
}

// ─── Persist ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn persist_assigns_identifiers() {
  let s = store().await;

  let report = s
    .persist(sample_report(
      "alpha",
      &["https://t.example/a"],
      vec![event_at(0), event_at(1500)],
    ))
    .await
    .unwrap();

  assert!(report.metadata.metadata_id > 0);
  assert!(report.session.session_id > 0);
  assert_eq!(report.session.metadata_id, report.metadata.metadata_id);
  assert_eq!(report.tracking_urls.len(), 1);
  assert_eq!(report.events.len(), 2);
  assert!(
    report
      .events
      .iter()
      .all(|e| e.metadata_hash == report.metadata.hash)
  );
  assert!(
    report
      .events
      .iter()
      .all(|e| e.session_id == report.session.session_id)
  );
}

#[tokio::test]
async fn metadata_deduplicated_by_hash() {
  let s = store().await;

  let a = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
    ]))
    .await
    .unwrap();
  let b = s
    .persist(sample_report("alpha", &["https://t.example/b"], vec![
      event_at(5),
    ]))
    .await
    .unwrap();

  assert_eq!(a.metadata.metadata_id, b.metadata.metadata_id);
  assert_eq!(count(&s, "metadata").await, 1);

  let c = s
    .persist(sample_report("beta", &["https://t.example/c"], vec![
      event_at(9),
    ]))
    .await
    .unwrap();
  assert_ne!(a.metadata.metadata_id, c.metadata.metadata_id);
  assert_eq!(count(&s, "metadata").await, 2);
}

#[tokio::test]
async fn content_hash_ignores_payload_key_order() {
  let left = NewMetadata::new(json!({"app_version": "1.0", "os": "android"}));
  let right = NewMetadata::new(json!({"os": "android", "app_version": "1.0"}));
  assert_eq!(left.content_hash(), right.content_hash());
}

#[tokio::test]
async fn persist_roundtrip_through_list_all() {
  let s = store().await;

  let persisted = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
      event_at(1500),
    ]))
    .await
    .unwrap();

  let all = s.list_all().await.unwrap();
  assert_eq!(all.len(), 1);

  let got = &all[0];
  assert_eq!(got.metadata.metadata_id, persisted.metadata.metadata_id);
  assert_eq!(got.metadata.payload, persisted.metadata.payload);
  assert_eq!(got.session.session_id, persisted.session.session_id);
  assert_eq!(got.session.session_key, persisted.session.session_key);
  assert_eq!(got.tracking_urls[0].url, "https://t.example/a");
  assert_eq!(
    got.events.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
    vec![0, 1500]
  );
  assert_eq!(got.events[0].fields, json!({"type": "impression"}));
}

#[tokio::test]
async fn persist_fans_events_out_per_url() {
  let s = store().await;

  let report = s
    .persist(sample_report(
      "alpha",
      &["https://t.example/a", "https://t.example/b"],
      vec![event_at(0), event_at(500)],
    ))
    .await
    .unwrap();

  // one row per (event, URL) pair
  assert_eq!(report.events.len(), 4);
  assert_eq!(count(&s, "events").await, 4);

  // one aggregate per (URL, session) pair, each carrying both events
  let all = s.list_all().await.unwrap();
  assert_eq!(all.len(), 2);
  assert!(all.iter().all(|r| r.events.len() == 2));
  assert!(
    all
      .iter()
      .all(|r| r.session.session_id == report.session.session_id)
  );
}

// ─── Append ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_events_extends_session_without_touching_other_tables() {
  let s = store().await;

  let persisted = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
    ]))
    .await
    .unwrap();

  let appended = s
    .append_events(
      persisted.session.session_id,
      persisted.tracking_urls.clone(),
      vec![event_at(9000)],
    )
    .await
    .unwrap();

  assert_eq!(appended.len(), 1);
  assert_eq!(appended[0].metadata_hash, persisted.metadata.hash);
  assert_eq!(appended[0].session_id, persisted.session.session_id);

  assert_eq!(count(&s, "events").await, 2);
  assert_eq!(count(&s, "sessions").await, 1);
  assert_eq!(count(&s, "metadata").await, 1);
  assert_eq!(count(&s, "tracking_urls").await, 1);
  assert_eq!(count(&s, "metadata_url_refs").await, 1);
}

#[tokio::test]
async fn append_events_missing_session_errors() {
  let s = store().await;

  let err = s
    .append_events(4242, vec![], vec![event_at(0)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SessionNotFound(4242)));
}

// ─── Collect ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn collect_unpinned_reclaims_everything_once_events_expire() {
  let s = zero_ttl_store().await;

  // Two aggregates sharing one metadata row by hash.
  s.persist(sample_report("alpha", &["https://t.example/a"], vec![
    event_at(0),
  ]))
  .await
  .unwrap();
  s.persist(sample_report("alpha", &["https://t.example/b"], vec![
    event_at(5),
  ]))
  .await
  .unwrap();
  assert_eq!(count(&s, "metadata").await, 1);
  assert_eq!(count(&s, "sessions").await, 2);

  s.collect(None).await.unwrap();

  for table in
    ["events", "sessions", "metadata", "metadata_url_refs", "tracking_urls"]
  {
    assert_eq!(count(&s, table).await, 0, "{table} not reclaimed");
  }
}

#[tokio::test]
async fn collect_pinned_preserves_rows_reachable_from_the_pin() {
  let s = zero_ttl_store().await;

  let a = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
    ]))
    .await
    .unwrap();
  s.persist(sample_report("beta", &["https://t.example/b"], vec![
    event_at(5),
  ]))
  .await
  .unwrap();

  s.collect(Some(a.clone())).await.unwrap();

  // Expired events fall even when pinned; everything else of A survives.
  assert_eq!(count(&s, "events").await, 0);
  assert_eq!(ids(&s, "sessions", "session_id").await, vec![
    a.session.session_id
  ]);
  assert_eq!(ids(&s, "metadata", "metadata_id").await, vec![
    a.metadata.metadata_id
  ]);
  assert_eq!(ids(&s, "metadata_url_refs", "metadata_id").await, vec![
    a.metadata.metadata_id
  ]);
  assert_eq!(ids(&s, "tracking_urls", "tracking_url_id").await, vec![
    a.tracking_urls[0].tracking_url_id
  ]);
}

#[tokio::test]
async fn collect_spares_fresh_sessions_with_no_events() {
  let s = store().await;

  // A session that produced no events yet only falls to its own TTL.
  s.persist(sample_report("alpha", &["https://t.example/a"], vec![]))
    .await
    .unwrap();

  s.collect(None).await.unwrap();

  assert_eq!(count(&s, "sessions").await, 1);
  assert_eq!(count(&s, "metadata").await, 1);
  assert_eq!(count(&s, "metadata_url_refs").await, 1);
  assert_eq!(count(&s, "tracking_urls").await, 1);
}

#[tokio::test]
async fn collect_reclaims_expired_sessions_transitively() {
  let s = zero_ttl_store().await;

  s.persist(sample_report("alpha", &["https://t.example/a"], vec![]))
    .await
    .unwrap();

  s.collect(None).await.unwrap();

  // The expired session takes its metadata, refs, and URL down with it.
  for table in ["sessions", "metadata", "metadata_url_refs", "tracking_urls"] {
    assert_eq!(count(&s, table).await, 0, "{table} not reclaimed");
  }
}

#[tokio::test]
async fn collect_is_idempotent() {
  let s = zero_ttl_store().await;

  let a = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
    ]))
    .await
    .unwrap();
  s.persist(sample_report("beta", &["https://t.example/b"], vec![
    event_at(5),
  ]))
  .await
  .unwrap();

  s.collect(Some(a.clone())).await.unwrap();
  let sessions = ids(&s, "sessions", "session_id").await;
  let metadata = ids(&s, "metadata", "metadata_id").await;
  let urls = ids(&s, "tracking_urls", "tracking_url_id").await;

  s.collect(Some(a)).await.unwrap();
  assert_eq!(ids(&s, "sessions", "session_id").await, sessions);
  assert_eq!(ids(&s, "metadata", "metadata_id").await, metadata);
  assert_eq!(ids(&s, "tracking_urls", "tracking_url_id").await, urls);
}

#[tokio::test]
async fn expired_events_reclaimed_even_from_the_pinned_aggregate() {
  let s = SqliteStore::open_in_memory(RetentionPolicy {
    event_ttl:   Duration::zero(),
    session_ttl: Duration::days(1),
  })
  .await
  .expect("in-memory store");

  let a = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
    ]))
    .await
    .unwrap();

  s.collect(Some(a)).await.unwrap();

  assert_eq!(count(&s, "events").await, 0);
  assert_eq!(count(&s, "sessions").await, 1);
  assert_eq!(count(&s, "metadata").await, 1);
}

#[tokio::test]
async fn collect_accepts_a_pin_that_was_never_persisted() {
  let s = zero_ttl_store().await;

  s.persist(sample_report("beta", &["https://t.example/b"], vec![
    event_at(0),
  ]))
  .await
  .unwrap();

  let pin = ReportingData {
    metadata:      Metadata {
      metadata_id: 999,
      hash:        "0f".repeat(32),
      payload:     json!({}),
    },
    session:       Session {
      session_id:  888,
      metadata_id: 999,
      session_key: Uuid::new_v4(),
      started_at:  Utc::now(),
    },
    tracking_urls: vec![TrackingUrl {
      tracking_url_id: 777,
      url:             "https://t.example/pin".into(),
    }],
    events:        vec![],
  };

  s.collect(Some(pin)).await.unwrap();

  // The unpersisted pin anchors nothing that exists; the persisted
  // aggregate is unreachable and goes away.
  for table in
    ["events", "sessions", "metadata", "metadata_url_refs", "tracking_urls"]
  {
    assert_eq!(count(&s, table).await, 0, "{table} not reclaimed");
  }
}

// ─── Point deletion ──────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_removes_exactly_the_aggregates_events() {
  let s = store().await;

  let a = s
    .persist(sample_report("alpha", &["https://t.example/a"], vec![
      event_at(0),
      event_at(1500),
    ]))
    .await
    .unwrap();
  let b = s
    .persist(sample_report("beta", &["https://t.example/b"], vec![
      event_at(9),
    ]))
    .await
    .unwrap();

  let all = s.list_all().await.unwrap();
  let exported = all
    .into_iter()
    .find(|r| r.session.session_id == a.session.session_id)
    .unwrap();
  s.delete(exported).await.unwrap();

  // B's event survives; A's session/metadata/URL rows are left for the
  // next collection pass.
  assert_eq!(ids(&s, "events", "event_id").await, vec![
    b.events[0].event_id
  ]);
  assert_eq!(count(&s, "sessions").await, 2);
  assert_eq!(count(&s, "metadata").await, 2);
  assert_eq!(count(&s, "tracking_urls").await, 2);
  assert_eq!(count(&s, "metadata_url_refs").await, 2);
}

// ─── Handle lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_handle_reports_unavailable() {
  let s = store().await;
  let clone = s.clone();

  s.close().await.unwrap();

  let err = clone.list_all().await.unwrap_err();
  assert!(matches!(err, Error::Unavailable));
}
