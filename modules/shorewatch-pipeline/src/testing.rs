// Test mocks for the alert/report pipeline.
//
// Three mocks matching the external trait boundaries:
// - MockOracle (VerificationOracle) - scripted judgment, optional delay
// - OfflineSpatial (SpatialReader/SpatialWriter) - every call fails
// - MockMediaStore (MediaStore) - records uploads, optional forced failure
//
// Plus fixtures for Alert/Report/Polygon construction and an event-receive
// helper that fails a test instead of hanging it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use shorewatch_common::events::Event;
use shorewatch_common::geo::{GeoPoint, Polygon};
use shorewatch_common::types::{MlAnalysis, Report};

use crate::bus::Subscriber;
use crate::traits::{
    MediaStore, MediaUpload, SpatialReader, SpatialWriter, StoredMedia, VerificationOracle,
};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Chennai, Tamil Nadu coordinates.
pub const CHENNAI: (f64, f64) = (13.0827, 80.2707);
/// Puducherry coordinates.
pub const PUDUCHERRY: (f64, f64) = (11.9416, 79.8083);
/// Visakhapatnam, Andhra Pradesh coordinates.
pub const VISAKHAPATNAM: (f64, f64) = (17.6868, 83.2185);

// ---------------------------------------------------------------------------
// MockOracle
// ---------------------------------------------------------------------------

/// Scripted verification oracle. `fake()`/`authentic()` return a canned
/// judgment, `failing()` errors on every call, `with_delay` makes the
/// judgment slow so timeout behavior can be exercised under paused time.
pub struct MockOracle {
    analysis: Option<MlAnalysis>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockOracle {
    pub fn fake() -> Self {
        Self {
            analysis: Some(fixtures::analysis(true)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn authentic() -> Self {
        Self {
            analysis: Some(fixtures::analysis(false)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            analysis: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationOracle for MockOracle {
    async fn analyze(&self, _report: &Report) -> Result<MlAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.analysis {
            Some(analysis) => Ok(analysis.clone()),
            None => bail!("MockOracle: scripted failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// OfflineSpatial
// ---------------------------------------------------------------------------

/// Spatial reader/writer whose every call fails, as if the index process is
/// down. Exercises the fail-closed targeting path.
pub struct OfflineSpatial;

#[async_trait]
impl SpatialReader for OfflineSpatial {
    async fn users_in_polygon(&self, _area: &Polygon) -> Result<Vec<Uuid>> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn reports_within_radius(&self, _center: GeoPoint, _radius_m: f64) -> Result<Vec<Uuid>> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn alerts_containing(&self, _point: GeoPoint) -> Result<Vec<Uuid>> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn user_location(&self, _user_id: Uuid) -> Result<Option<GeoPoint>> {
        bail!("OfflineSpatial: index unavailable")
    }
}

#[async_trait]
impl SpatialWriter for OfflineSpatial {
    async fn upsert_report_location(&self, _report_id: Uuid, _location: GeoPoint) -> Result<()> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn remove_report_location(&self, _report_id: Uuid) -> Result<()> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn insert_alert_area(&self, _alert_id: Uuid, _area: &Polygon) -> Result<()> {
        bail!("OfflineSpatial: index unavailable")
    }

    async fn remove_alert_area(&self, _alert_id: Uuid) -> Result<()> {
        bail!("OfflineSpatial: index unavailable")
    }
}

// ---------------------------------------------------------------------------
// MockMediaStore
// ---------------------------------------------------------------------------

struct MockMediaInner {
    stored: Vec<StoredMedia>,
    fail: bool,
}

/// Records every stored upload under a deterministic key. `failing()` makes
/// every store call error, for the submission-abort path.
pub struct MockMediaStore {
    inner: Mutex<MockMediaInner>,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockMediaInner {
                stored: Vec::new(),
                fail: false,
            }),
        }
    }

    /// Make every `store` call return an error.
    pub fn failing(self) -> Self {
        self.inner.lock().unwrap().fail = true;
        self
    }

    pub fn stored_count(&self) -> usize {
        self.inner.lock().unwrap().stored.len()
    }

    pub fn stored_keys(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.stored.iter().map(|m| m.key.clone()).collect()
    }
}

impl Default for MockMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn store(&self, upload: &MediaUpload) -> Result<StoredMedia> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail {
            bail!("MockMediaStore: forced upload failure");
        }
        let key = format!("uploads/{}-{}", inner.stored.len(), upload.filename);
        let media = StoredMedia {
            url: format!("https://media.test/{key}"),
            key,
        };
        inner.stored.push(media.clone());
        Ok(media)
    }
}

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

/// Receive exactly `n` events, panicking after a deadline so a missing event
/// fails the test instead of hanging it.
pub async fn recv_events(subscriber: &mut Subscriber, n: usize) -> Vec<Event> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        let event = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("timed out waiting for a bus event")
            .expect("bus closed while waiting for an event");
        events.push(event);
    }
    events
}

/// Drain whatever is immediately available on the subscriber.
pub fn drain_events(subscriber: &mut Subscriber) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = subscriber.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub mod fixtures {
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    use shorewatch_common::geo::{GeoPoint, Polygon};
    use shorewatch_common::types::{
        Alert, AlertDraft, AlertKind, AlertSeverity, Caller, Channel, FakeDetection, HazardKind,
        MlAnalysis, Report, ReportDraft, ReportSeverity, ReportStatus, Role,
    };

    pub fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    /// The (0,0)-(1,1) square from the targeting scenario.
    pub fn unit_square() -> Polygon {
        Polygon {
            ring: vec![
                point(0.0, 0.0),
                point(0.0, 1.0),
                point(1.0, 1.0),
                point(1.0, 0.0),
            ],
        }
    }

    /// A square of `half` degrees around a center point.
    pub fn square_around(center: GeoPoint, half: f64) -> Polygon {
        Polygon {
            ring: vec![
                point(center.lat - half, center.lng - half),
                point(center.lat - half, center.lng + half),
                point(center.lat + half, center.lng + half),
                point(center.lat + half, center.lng - half),
            ],
        }
    }

    /// An active cyclone warning over `area`, expiring in an hour.
    pub fn alert(area: Polygon, now: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            title: "Cyclone warning".to_string(),
            message: "Severe cyclonic storm approaching the coast".to_string(),
            kind: AlertKind::Warning,
            severity: AlertSeverity::Severe,
            area,
            issued_by: Uuid::new_v4(),
            expires_at: now + Duration::hours(1),
            active: true,
            channels: vec![Channel::App],
            recipients: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A draft matching `alert`, for pipeline-level creation tests.
    pub fn alert_draft(area: Polygon, now: DateTime<Utc>) -> AlertDraft {
        AlertDraft {
            title: "Cyclone warning".to_string(),
            message: "Severe cyclonic storm approaching the coast".to_string(),
            kind: AlertKind::Warning,
            severity: AlertSeverity::Severe,
            area,
            issued_by: Uuid::new_v4(),
            expires_at: now + Duration::hours(1),
            channels: Vec::new(),
        }
    }

    /// A pending flood report near Chennai's Marina Beach.
    pub fn report(now: DateTime<Utc>) -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: Uuid::new_v4(),
            title: "Flooding near Marina Beach".to_string(),
            description: "Knee-deep water on the service road".to_string(),
            hazard: HazardKind::Flood,
            severity: ReportSeverity::High,
            location: point(13.0500, 80.2824),
            address: "Marina Beach service road, Chennai".to_string(),
            media: Vec::new(),
            status: ReportStatus::Pending,
            verification_score: 0.0,
            ml_analysis: None,
            is_emergency: false,
            view_count: 0,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A draft matching `report`, for pipeline-level submission tests.
    pub fn report_draft() -> ReportDraft {
        ReportDraft {
            reporter_id: Uuid::new_v4(),
            title: "Flooding near Marina Beach".to_string(),
            description: "Knee-deep water on the service road".to_string(),
            hazard: HazardKind::Flood,
            severity: ReportSeverity::High,
            location: point(13.0500, 80.2824),
            address: "Marina Beach service road, Chennai".to_string(),
            is_emergency: false,
        }
    }

    /// A canned oracle judgment.
    pub fn analysis(is_fake: bool) -> MlAnalysis {
        MlAnalysis {
            sentiment: "negative".to_string(),
            confidence: 0.91,
            keywords: vec!["flood".to_string(), "water".to_string()],
            fake_detection: FakeDetection {
                is_fake,
                confidence: 0.87,
            },
        }
    }

    pub fn citizen(id: Uuid) -> Caller {
        Caller::new(id, Role::Citizen)
    }

    pub fn officer() -> Caller {
        Caller::new(Uuid::new_v4(), Role::GovOfficer)
    }
}

// ---------------------------------------------------------------------------
// Mock self-tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn mock_oracle_counts_calls_and_fails_on_script() {
        let report = fixtures::report(chrono::Utc::now());

        let oracle = MockOracle::fake();
        let analysis = oracle.analyze(&report).await.unwrap();
        assert!(analysis.fake_detection.is_fake);
        assert_eq!(oracle.calls(), 1);

        let failing = MockOracle::failing();
        assert!(failing.analyze(&report).await.is_err());
    }

    #[tokio::test]
    async fn mock_media_store_records_and_fails_on_demand() {
        let upload = MediaUpload {
            filename: "wave.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            bytes: Bytes::from_static(b"jpeg"),
        };

        let store = MockMediaStore::new();
        let stored = store.store(&upload).await.unwrap();
        assert_eq!(stored.key, "uploads/0-wave.jpg");
        assert_eq!(store.stored_count(), 1);

        let failing = MockMediaStore::new().failing();
        assert!(failing.store(&upload).await.is_err());
        assert_eq!(failing.stored_count(), 0);
    }
}
