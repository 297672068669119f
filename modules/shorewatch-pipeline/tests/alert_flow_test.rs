//! End-to-end alert lifecycle scenarios: targeting against a real spatial
//! index, deactivation and expiry sweeps, read receipts, and the role-gated
//! feed. Everything runs on the in-memory stores; the bus is observed
//! through a real subscriber.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::events::Event;
use shorewatch_common::types::Channel;
use shorewatch_pipeline::testing::{drain_events, fixtures, recv_events, MockMediaStore, MockOracle, OfflineSpatial};
use shorewatch_pipeline::{
    AlertPipeline, AlertStore, MemoryAlertStore, MemoryReportStore, NotificationBus, PipelineDeps,
};
use shorewatch_spatial::SpatialIndex;

fn memory_deps(index: Arc<SpatialIndex>) -> (PipelineDeps, NotificationBus, Arc<MemoryAlertStore>) {
    let bus = NotificationBus::new(64);
    let alert_store = Arc::new(MemoryAlertStore::new());
    let deps = PipelineDeps::builder()
        .alert_store(alert_store.clone())
        .report_store(Arc::new(MemoryReportStore::new()))
        .spatial_reader(index.clone())
        .spatial_writer(index)
        .media_store(Arc::new(MockMediaStore::new()))
        .oracle(Arc::new(MockOracle::authentic()))
        .bus(bus.clone())
        .build();
    (deps, bus, alert_store)
}

// ---------------------------------------------------------------------------
// Scenario 1: square polygon targets only the user inside it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn square_polygon_targets_only_the_inside_user() {
    let index = Arc::new(SpatialIndex::new());
    let inside = Uuid::new_v4();
    let outside = Uuid::new_v4();
    index.upsert_user(inside, fixtures::point(0.5, 0.5)).unwrap();
    index.upsert_user(outside, fixtures::point(5.0, 5.0)).unwrap();

    let (deps, bus, _) = memory_deps(index);
    let pipeline = AlertPipeline::new(deps);
    let mut subscriber = bus.subscribe();

    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await
        .unwrap();

    assert_eq!(alert.recipients.len(), 1, "only the user at (0.5, 0.5) is inside");
    assert_eq!(alert.recipients[0].user_id, inside);
    assert!(alert.active);

    let events = recv_events(&mut subscriber, 1).await;
    match &events[0] {
        Event::NewAlert { alert: published, target_users } => {
            assert_eq!(published.id, alert.id);
            assert_eq!(target_users, &vec![inside]);
        }
        other => panic!("expected NewAlert, got {}", other.kind()),
    }
}

// ---------------------------------------------------------------------------
// Scenario 2: recipients are sorted by user id with no duplicates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recipients_are_sorted_with_no_duplicates() {
    let index = Arc::new(SpatialIndex::new());
    let mut users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    // Insert in an arbitrary order; the index answers sorted by id.
    index.upsert_user(users[2], fixtures::point(0.2, 0.2)).unwrap();
    index.upsert_user(users[0], fixtures::point(0.5, 0.5)).unwrap();
    index.upsert_user(users[1], fixtures::point(0.8, 0.8)).unwrap();

    let (deps, _, _) = memory_deps(index);
    let pipeline = AlertPipeline::new(deps);

    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await
        .unwrap();

    let recipient_ids: Vec<Uuid> = alert.recipients.iter().map(|r| r.user_id).collect();
    users.sort_unstable();
    assert_eq!(recipient_ids, users);
}

// ---------------------------------------------------------------------------
// Scenario 3: spatial index down → creation fails closed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn targeting_failure_aborts_creation() {
    let bus = NotificationBus::new(64);
    let alert_store = Arc::new(MemoryAlertStore::new());
    let deps = PipelineDeps::builder()
        .alert_store(alert_store.clone())
        .report_store(Arc::new(MemoryReportStore::new()))
        .spatial_reader(Arc::new(OfflineSpatial))
        .spatial_writer(Arc::new(OfflineSpatial))
        .media_store(Arc::new(MockMediaStore::new()))
        .oracle(Arc::new(MockOracle::authentic()))
        .bus(bus.clone())
        .build();
    let pipeline = AlertPipeline::new(deps);
    let mut subscriber = bus.subscribe();

    let result = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await;

    assert!(
        matches!(result, Err(ShorewatchError::TargetingUnavailable(_))),
        "expected TargetingUnavailable, got {result:?}"
    );
    assert!(alert_store.active_alerts().await.unwrap().is_empty());
    assert!(drain_events(&mut subscriber).is_empty(), "no event for an aborted alert");
}

// ---------------------------------------------------------------------------
// Scenario 4: invalid drafts are rejected before targeting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let (deps, bus, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);
    let mut subscriber = bus.subscribe();
    let now = Utc::now();

    let mut blank_title = fixtures::alert_draft(fixtures::unit_square(), now);
    blank_title.title = "  ".to_string();
    assert!(matches!(
        pipeline.create(blank_title, now).await,
        Err(ShorewatchError::Validation(_))
    ));

    let mut expired = fixtures::alert_draft(fixtures::unit_square(), now);
    expired.expires_at = now - chrono::Duration::minutes(5);
    assert!(matches!(
        pipeline.create(expired, now).await,
        Err(ShorewatchError::Validation(_))
    ));

    // Self-intersecting ring.
    let bowtie = shorewatch_common::geo::Polygon {
        ring: vec![
            fixtures::point(0.0, 0.0),
            fixtures::point(1.0, 1.0),
            fixtures::point(0.0, 1.0),
            fixtures::point(1.0, 0.0),
        ],
    };
    assert!(matches!(
        pipeline.create(fixtures::alert_draft(bowtie, now), now).await,
        Err(ShorewatchError::InvalidGeometry(_))
    ));

    assert!(drain_events(&mut subscriber).is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 5: empty channel set defaults to the app channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_channels_default_to_app() {
    let (deps, _, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);

    let draft = fixtures::alert_draft(fixtures::unit_square(), Utc::now());
    assert!(draft.channels.is_empty());
    let alert = pipeline.create(draft, Utc::now()).await.unwrap();
    assert_eq!(alert.channels, vec![Channel::App]);
}

// ---------------------------------------------------------------------------
// Scenario 6: the recipient list is a creation-time snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recipient_snapshot_is_never_recomputed() {
    let index = Arc::new(SpatialIndex::new());
    let early = Uuid::new_v4();
    index.upsert_user(early, fixtures::point(0.5, 0.5)).unwrap();

    let (deps, _, _) = memory_deps(index.clone());
    let pipeline = AlertPipeline::new(deps);
    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await
        .unwrap();

    // A user who wanders in later is not retargeted...
    let latecomer = Uuid::new_v4();
    index.upsert_user(latecomer, fixtures::point(0.4, 0.4)).unwrap();
    let stored = pipeline.fetch(alert.id).await.unwrap();
    assert_eq!(stored.recipients.len(), 1);
    assert_eq!(stored.recipients[0].user_id, early);

    // ...but the live geometry still puts the alert in their feed.
    let feed = pipeline
        .active_alerts_for(&fixtures::citizen(latecomer))
        .await
        .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, alert.id);
}

// ---------------------------------------------------------------------------
// Scenario 7: deactivating twice publishes exactly one event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_deactivation_publishes_one_event() {
    let (deps, bus, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);
    let mut subscriber = bus.subscribe();

    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await
        .unwrap();

    pipeline.deactivate(alert.id).await.unwrap();
    pipeline.deactivate(alert.id).await.unwrap();

    assert!(!pipeline.fetch(alert.id).await.unwrap().active);

    let events = drain_events(&mut subscriber);
    let deactivations = events
        .iter()
        .filter(|e| matches!(e, Event::AlertDeactivated { alert_id } if *alert_id == alert.id))
        .count();
    assert_eq!(deactivations, 1, "second deactivation must not publish");
}

// ---------------------------------------------------------------------------
// Scenario 8: explicit deactivation racing the expiry sweep
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deactivate_racing_sweep_publishes_one_event() {
    let (deps, bus, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);
    let mut subscriber = bus.subscribe();

    let now = Utc::now();
    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), now), now)
        .await
        .unwrap();
    let past_expiry = alert.expires_at + chrono::Duration::minutes(1);

    let (deactivated, swept) = tokio::join!(
        pipeline.deactivate(alert.id),
        pipeline.sweep_expired(past_expiry),
    );
    deactivated.unwrap();
    let swept = swept.unwrap();
    assert!(swept.len() <= 1);

    assert!(!pipeline.fetch(alert.id).await.unwrap().active);

    let events = drain_events(&mut subscriber);
    let deactivations = events
        .iter()
        .filter(|e| matches!(e, Event::AlertDeactivated { .. }))
        .count();
    assert_eq!(deactivations, 1, "the losing side of the race must stay silent");
}

// ---------------------------------------------------------------------------
// Scenario 9: sweeps leave unexpired and already-inactive alerts alone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_ignores_unexpired_and_inactive_alerts() {
    let (deps, _, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);

    let now = Utc::now();
    let due = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), now), now)
        .await
        .unwrap();
    let mut live_draft = fixtures::alert_draft(fixtures::unit_square(), now);
    live_draft.expires_at = now + chrono::Duration::days(1);
    let live = pipeline.create(live_draft, now).await.unwrap();
    let retired = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), now), now)
        .await
        .unwrap();
    pipeline.deactivate(retired.id).await.unwrap();

    let past_first_expiry = due.expires_at + chrono::Duration::minutes(1);
    let expired = pipeline.sweep_expired(past_first_expiry).await.unwrap();
    assert_eq!(expired, vec![due.id], "only the past-due active alert expires");

    assert!(!pipeline.fetch(due.id).await.unwrap().active);
    assert!(pipeline.fetch(live.id).await.unwrap().active);
    assert!(!pipeline.fetch(retired.id).await.unwrap().active, "sweep never reactivates");

    assert!(pipeline.sweep_expired(past_first_expiry).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 10: citizens see alerts covering them, operators see everything
// ---------------------------------------------------------------------------

#[tokio::test]
async fn citizen_feed_follows_location_operator_sees_all() {
    let index = Arc::new(SpatialIndex::new());
    let coastal = Uuid::new_v4();
    index.upsert_user(coastal, fixtures::point(0.5, 0.5)).unwrap();

    let (deps, _, _) = memory_deps(index.clone());
    let pipeline = AlertPipeline::new(deps);

    let t0 = Utc::now();
    let near = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), t0), t0)
        .await
        .unwrap();
    let t1 = t0 + chrono::Duration::minutes(1);
    let far_area = fixtures::square_around(fixtures::point(5.0, 5.0), 0.5);
    let far = pipeline
        .create(fixtures::alert_draft(far_area, t1), t1)
        .await
        .unwrap();

    let feed = pipeline
        .active_alerts_for(&fixtures::citizen(coastal))
        .await
        .unwrap();
    assert_eq!(feed.len(), 1, "citizen only sees the alert covering them");
    assert_eq!(feed[0].id, near.id);

    let all = pipeline
        .active_alerts_for(&fixtures::officer())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, far.id, "operator feed is newest first");
    assert_eq!(all[1].id, near.id);

    // A citizen the index has never seen gets nothing.
    let feed = pipeline
        .active_alerts_for(&fixtures::citizen(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(feed.is_empty());

    // Deactivation drops the geometry out of the feed.
    pipeline.deactivate(near.id).await.unwrap();
    let feed = pipeline
        .active_alerts_for(&fixtures::citizen(coastal))
        .await
        .unwrap();
    assert!(feed.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario 11: read receipts are set once, by the recipient only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_receipt_is_set_exactly_once() {
    let index = Arc::new(SpatialIndex::new());
    let reader = Uuid::new_v4();
    index.upsert_user(reader, fixtures::point(0.5, 0.5)).unwrap();

    let (deps, _, _) = memory_deps(index);
    let pipeline = AlertPipeline::new(deps);
    let alert = pipeline
        .create(fixtures::alert_draft(fixtures::unit_square(), Utc::now()), Utc::now())
        .await
        .unwrap();

    let first = Utc::now();
    pipeline.mark_read(alert.id, reader, first).await.unwrap();
    let later = first + chrono::Duration::minutes(10);
    pipeline.mark_read(alert.id, reader, later).await.unwrap();

    let stored = pipeline.fetch(alert.id).await.unwrap();
    assert_eq!(stored.recipients[0].read_at, Some(first), "read_at is never overwritten");

    // A non-recipient read is a quiet no-op.
    pipeline
        .mark_read(alert.id, Uuid::new_v4(), Utc::now())
        .await
        .unwrap();
    let stored = pipeline.fetch(alert.id).await.unwrap();
    assert_eq!(stored.recipients.len(), 1);
}

// ---------------------------------------------------------------------------
// Scenario 12: unknown alert ids
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_alert_ids_are_not_found() {
    let (deps, _, _) = memory_deps(Arc::new(SpatialIndex::new()));
    let pipeline = AlertPipeline::new(deps);
    let ghost = Uuid::new_v4();

    assert!(matches!(
        pipeline.fetch(ghost).await,
        Err(ShorewatchError::NotFound(_))
    ));
    assert!(matches!(
        pipeline.deactivate(ghost).await,
        Err(ShorewatchError::NotFound(_))
    ));
    assert!(matches!(
        pipeline.mark_read(ghost, Uuid::new_v4(), Utc::now()).await,
        Err(ShorewatchError::NotFound(_))
    ));
}
