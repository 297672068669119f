//! In-memory store implementations.
//!
//! Entities live behind per-entity locks under an outer map lock, so
//! mutations of different entities never contend and no global write lock is
//! held across an entity update. Map locks and entity locks are never held
//! at the same time as another entity's lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shorewatch_common::types::{
    Alert, MlAnalysis, Report, ReportFilter, ReportStats, ReportStatus,
};

use crate::traits::{
    AlertStore, MediaStore, MediaUpload, ReportStore, StoredMedia, Transition,
};

type EntityMap<T> = RwLock<HashMap<Uuid, Arc<Mutex<T>>>>;

fn handle_of<T>(map: &EntityMap<T>, id: Uuid) -> Option<Arc<Mutex<T>>> {
    map.read().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: EntityMap<Alert>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let mut map = self.alerts.write().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(&alert.id) {
            bail!("alert {} already exists", alert.id);
        }
        map.insert(alert.id, Arc::new(Mutex::new(alert.clone())));
        Ok(())
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(handle_of(&self.alerts, id)
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone()))
    }

    async fn deactivate_alert(&self, id: Uuid, now: DateTime<Utc>) -> Result<Transition> {
        let Some(handle) = handle_of(&self.alerts, id) else {
            return Ok(Transition::Missing);
        };
        let mut alert = handle.lock().unwrap_or_else(|e| e.into_inner());
        if !alert.active {
            return Ok(Transition::Noop);
        }
        alert.active = false;
        alert.updated_at = now;
        Ok(Transition::Applied)
    }

    async fn mark_read(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let Some(handle) = handle_of(&self.alerts, alert_id) else {
            return Ok(Transition::Missing);
        };
        let mut alert = handle.lock().unwrap_or_else(|e| e.into_inner());
        let Some(i) = alert.recipients.iter().position(|r| r.user_id == user_id) else {
            return Ok(Transition::Noop);
        };
        if alert.recipients[i].read_at.is_some() {
            return Ok(Transition::Noop);
        }
        // Reading proves delivery.
        if alert.recipients[i].delivered_at.is_none() {
            alert.recipients[i].delivered_at = Some(now);
        }
        alert.recipients[i].read_at = Some(now);
        alert.updated_at = now;
        Ok(Transition::Applied)
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>> {
        let handles: Vec<Arc<Mutex<Alert>>> = {
            let map = self.alerts.read().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };
        let mut alerts: Vec<Alert> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .filter(|a| a.active)
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(alerts)
    }

    async fn alerts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Alert>> {
        let map = self.alerts.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect())
    }

    async fn expire_alerts(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let handles: Vec<(Uuid, Arc<Mutex<Alert>>)> = {
            let map = self.alerts.read().unwrap_or_else(|e| e.into_inner());
            map.iter().map(|(id, h)| (*id, h.clone())).collect()
        };
        let mut expired = Vec::new();
        for (id, handle) in handles {
            let mut alert = handle.lock().unwrap_or_else(|e| e.into_inner());
            if alert.active && alert.is_expired(now) {
                alert.active = false;
                alert.updated_at = now;
                expired.push(id);
            }
        }
        expired.sort_unstable();
        Ok(expired)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryReportStore {
    reports: EntityMap<Report>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert_report(&self, report: &Report) -> Result<()> {
        let mut map = self.reports.write().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(&report.id) {
            bail!("report {} already exists", report.id);
        }
        map.insert(report.id, Arc::new(Mutex::new(report.clone())));
        Ok(())
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(handle_of(&self.reports, id)
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone()))
    }

    async fn apply_analysis(
        &self,
        id: Uuid,
        analysis: &MlAnalysis,
        score: f64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(handle) = handle_of(&self.reports, id) else {
            return Ok(false);
        };
        let mut report = handle.lock().unwrap_or_else(|e| e.into_inner());
        report.ml_analysis = Some(analysis.clone());
        report.verification_score = score;
        report.updated_at = now;
        Ok(true)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        reviewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(handle) = handle_of(&self.reports, id) else {
            return Ok(false);
        };
        let mut report = handle.lock().unwrap_or_else(|e| e.into_inner());
        report.status = status;
        report.reviewed_by = Some(reviewer);
        report.reviewed_at = Some(now);
        report.updated_at = now;
        Ok(true)
    }

    async fn increment_views(&self, id: Uuid) -> Result<Option<Report>> {
        let Some(handle) = handle_of(&self.reports, id) else {
            return Ok(None);
        };
        let mut report = handle.lock().unwrap_or_else(|e| e.into_inner());
        report.view_count += 1;
        Ok(Some(report.clone()))
    }

    async fn delete_report(&self, id: Uuid) -> Result<bool> {
        let mut map = self.reports.write().unwrap_or_else(|e| e.into_inner());
        Ok(map.remove(&id).is_some())
    }

    async fn filter_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let handles: Vec<Arc<Mutex<Report>>> = {
            let map = self.reports.read().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };
        let mut reports: Vec<Report> = handles
            .iter()
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .filter(|r| filter.matches(r))
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(reports)
    }

    async fn reports_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Report>> {
        let map = self.reports.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .map(|h| h.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect())
    }

    async fn stats(&self, recent_limit: usize) -> Result<ReportStats> {
        let reports = self.filter_reports(&ReportFilter::default()).await?;
        Ok(ReportStats {
            total: reports.len() as u64,
            pending: reports
                .iter()
                .filter(|r| r.status == ReportStatus::Pending)
                .count() as u64,
            verified: reports
                .iter()
                .filter(|r| r.status == ReportStatus::Verified)
                .count() as u64,
            emergency: reports.iter().filter(|r| r.is_emergency).count() as u64,
            recent: reports.into_iter().take(recent_limit).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Stand-in for deployments that never accept uploads (the maintenance
/// worker). Every store attempt fails.
pub struct NoopMediaStore;

#[async_trait]
impl MediaStore for NoopMediaStore {
    async fn store(&self, upload: &MediaUpload) -> Result<StoredMedia> {
        bail!("no media storage configured; cannot store {}", upload.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryAlertStore::new();
        let alert = fixtures::alert(fixtures::unit_square(), Utc::now());
        store.insert_alert(&alert).await.unwrap();
        assert!(store.insert_alert(&alert).await.is_err());
    }

    #[tokio::test]
    async fn deactivate_applies_exactly_once() {
        let store = MemoryAlertStore::new();
        let alert = fixtures::alert(fixtures::unit_square(), Utc::now());
        store.insert_alert(&alert).await.unwrap();

        assert_eq!(
            store.deactivate_alert(alert.id, Utc::now()).await.unwrap(),
            Transition::Applied
        );
        assert_eq!(
            store.deactivate_alert(alert.id, Utc::now()).await.unwrap(),
            Transition::Noop
        );
        assert_eq!(
            store.deactivate_alert(Uuid::new_v4(), Utc::now()).await.unwrap(),
            Transition::Missing
        );
    }

    #[tokio::test]
    async fn mark_read_sets_once_and_ignores_strangers() {
        let store = MemoryAlertStore::new();
        let user = Uuid::new_v4();
        let mut alert = fixtures::alert(fixtures::unit_square(), Utc::now());
        alert.recipients = vec![shorewatch_common::types::Recipient::new(user)];
        store.insert_alert(&alert).await.unwrap();

        let first = Utc::now();
        assert_eq!(
            store.mark_read(alert.id, user, first).await.unwrap(),
            Transition::Applied
        );
        assert_eq!(
            store.mark_read(alert.id, user, Utc::now()).await.unwrap(),
            Transition::Noop
        );

        let stored = store.get_alert(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.recipients[0].read_at, Some(first));
        assert_eq!(stored.recipients[0].delivered_at, Some(first));

        // Not a recipient: no-op, nothing recorded.
        assert_eq!(
            store
                .mark_read(alert.id, Uuid::new_v4(), Utc::now())
                .await
                .unwrap(),
            Transition::Noop
        );
    }

    #[tokio::test]
    async fn expire_alerts_flips_only_past_due() {
        let store = MemoryAlertStore::new();
        let now = Utc::now();

        let mut due = fixtures::alert(fixtures::unit_square(), now);
        due.expires_at = now - chrono::Duration::minutes(1);
        let mut live = fixtures::alert(fixtures::unit_square(), now);
        live.expires_at = now + chrono::Duration::hours(1);
        store.insert_alert(&due).await.unwrap();
        store.insert_alert(&live).await.unwrap();

        assert_eq!(store.expire_alerts(now).await.unwrap(), vec![due.id]);
        // Second sweep finds nothing new.
        assert!(store.expire_alerts(now).await.unwrap().is_empty());
        assert!(store.get_alert(live.id).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn set_status_records_reviewer() {
        let store = MemoryReportStore::new();
        let report = fixtures::report(Utc::now());
        store.insert_report(&report).await.unwrap();

        let reviewer = Uuid::new_v4();
        let at = Utc::now();
        assert!(store
            .set_status(report.id, ReportStatus::Verified, reviewer, at)
            .await
            .unwrap());

        let stored = store.get_report(report.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Verified);
        assert_eq!(stored.reviewed_by, Some(reviewer));
        assert_eq!(stored.reviewed_at, Some(at));

        assert!(!store
            .set_status(Uuid::new_v4(), ReportStatus::Verified, reviewer, at)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn increment_views_returns_updated_report() {
        let store = MemoryReportStore::new();
        let report = fixtures::report(Utc::now());
        store.insert_report(&report).await.unwrap();

        let updated = store.increment_views(report.id).await.unwrap().unwrap();
        assert_eq!(updated.view_count, 1);
        let updated = store.increment_views(report.id).await.unwrap().unwrap();
        assert_eq!(updated.view_count, 2);

        assert!(store.increment_views(Uuid::new_v4()).await.unwrap().is_none());
    }
}
