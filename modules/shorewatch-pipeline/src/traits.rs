// Trait abstractions for the pipeline's collaborators.
//
// SpatialReader/SpatialWriter front the in-process SpatialIndex so a remote
// geo-capable store could stand in without touching the lifecycles.
// AlertStore/ReportStore are the persistence seams, MediaStore is object
// storage, VerificationOracle is the analysis service.
//
// These enable deterministic testing with the mocks in `testing`:
// no network, no database. `cargo test` in seconds.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shorewatch_common::geo::{GeoPoint, Polygon};
use shorewatch_common::types::{Alert, MlAnalysis, Report, ReportFilter, ReportStats, ReportStatus};
use shorewatch_spatial::SpatialIndex;

/// Outcome of an idempotent state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This call made the change.
    Applied,
    /// Nothing to do: the entity was already in the requested state (or, for
    /// read receipts, the user is not a recipient).
    Noop,
    /// No such entity.
    Missing,
}

// ---------------------------------------------------------------------------
// SpatialReader / SpatialWriter - front SpatialIndex
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpatialReader: Send + Sync {
    /// Users currently located inside the polygon, sorted by id, no
    /// duplicates.
    async fn users_in_polygon(&self, area: &Polygon) -> Result<Vec<Uuid>>;

    /// Reports within `radius_m` meters of `center`, closest first.
    async fn reports_within_radius(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<Uuid>>;

    /// Ids of live alert polygons containing the point.
    async fn alerts_containing(&self, point: GeoPoint) -> Result<Vec<Uuid>>;

    /// Last known location for a user, if any.
    async fn user_location(&self, user_id: Uuid) -> Result<Option<GeoPoint>>;
}

#[async_trait]
pub trait SpatialWriter: Send + Sync {
    /// Record or move a report's point.
    async fn upsert_report_location(&self, report_id: Uuid, location: GeoPoint) -> Result<()>;

    /// Drop a report's point.
    async fn remove_report_location(&self, report_id: Uuid) -> Result<()>;

    /// Register a live alert's polygon for containment queries.
    async fn insert_alert_area(&self, alert_id: Uuid, area: &Polygon) -> Result<()>;

    /// Drop a no-longer-live alert's polygon.
    async fn remove_alert_area(&self, alert_id: Uuid) -> Result<()>;
}

#[async_trait]
impl SpatialReader for SpatialIndex {
    async fn users_in_polygon(&self, area: &Polygon) -> Result<Vec<Uuid>> {
        Ok(SpatialIndex::users_in_polygon(self, area)?)
    }

    async fn reports_within_radius(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<Uuid>> {
        Ok(SpatialIndex::reports_within_radius(self, center, radius_m)?)
    }

    async fn alerts_containing(&self, point: GeoPoint) -> Result<Vec<Uuid>> {
        Ok(SpatialIndex::alerts_containing(self, point)?)
    }

    async fn user_location(&self, user_id: Uuid) -> Result<Option<GeoPoint>> {
        Ok(SpatialIndex::user_location(self, user_id))
    }
}

#[async_trait]
impl SpatialWriter for SpatialIndex {
    async fn upsert_report_location(&self, report_id: Uuid, location: GeoPoint) -> Result<()> {
        Ok(SpatialIndex::upsert_report(self, report_id, location)?)
    }

    async fn remove_report_location(&self, report_id: Uuid) -> Result<()> {
        SpatialIndex::remove_report(self, report_id);
        Ok(())
    }

    async fn insert_alert_area(&self, alert_id: Uuid, area: &Polygon) -> Result<()> {
        Ok(SpatialIndex::insert_alert_area(self, alert_id, area.clone())?)
    }

    async fn remove_alert_area(&self, alert_id: Uuid) -> Result<()> {
        SpatialIndex::remove_alert_area(self, alert_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AlertStore - alert persistence seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist a new alert. Fails if the id already exists.
    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    /// Fetch an alert by id.
    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;

    /// Flip an active alert to inactive.
    async fn deactivate_alert(&self, id: Uuid, now: DateTime<Utc>) -> Result<Transition>;

    /// Set `read_at` on the matching recipient if unset.
    async fn mark_read(&self, alert_id: Uuid, user_id: Uuid, now: DateTime<Utc>)
        -> Result<Transition>;

    /// All active alerts, newest first.
    async fn active_alerts(&self) -> Result<Vec<Alert>>;

    /// Fetch several alerts by id, preserving input order. Missing ids are
    /// skipped.
    async fn alerts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Alert>>;

    /// Flip every active alert whose expiry is at or before `now` to
    /// inactive. Returns the ids this call expired; an id racing an explicit
    /// deactivation lands in at most one caller's result.
    async fn expire_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;
}

// ---------------------------------------------------------------------------
// ReportStore - report persistence seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new report. Fails if the id already exists.
    async fn insert_report(&self, report: &Report) -> Result<()>;

    /// Fetch a report by id.
    async fn get_report(&self, id: Uuid) -> Result<Option<Report>>;

    /// Record the oracle's judgment and the derived score. Leaves `status`
    /// untouched. Returns false if the report no longer exists.
    async fn apply_analysis(
        &self,
        id: Uuid,
        analysis: &MlAnalysis,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Move a report to a reviewed status, recording the reviewer. Target
    /// validity is the caller's concern. Returns false for unknown ids.
    async fn set_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        reviewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically bump the view counter, returning the updated report.
    /// Concurrent bumps are never lost.
    async fn increment_views(&self, id: Uuid) -> Result<Option<Report>>;

    /// Remove a report. Returns false for unknown ids.
    async fn delete_report(&self, id: Uuid) -> Result<bool>;

    /// Reports matching the attribute filter, newest first. Geo constraints
    /// are resolved through SpatialReader before this call.
    async fn filter_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>>;

    /// Fetch several reports by id, preserving input order. Missing ids are
    /// skipped.
    async fn reports_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Report>>;

    /// Dashboard roll-up counts plus the most recent reports.
    async fn stats(&self, recent_limit: usize) -> Result<ReportStats>;
}

// ---------------------------------------------------------------------------
// MediaStore - object storage seam
// ---------------------------------------------------------------------------

/// A raw upload as received from the submitter.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub filename: String,
    pub mime: String,
    pub bytes: Bytes,
}

/// Where a stored upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    pub key: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist an upload, returning its public URL and storage key.
    async fn store(&self, upload: &MediaUpload) -> Result<StoredMedia>;
}

// ---------------------------------------------------------------------------
// VerificationOracle - analysis service seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VerificationOracle: Send + Sync {
    /// Analyze a report's text and media. The call itself applies no
    /// timeout; dispatch bounds it.
    async fn analyze(&self, report: &Report) -> Result<MlAnalysis>;
}
