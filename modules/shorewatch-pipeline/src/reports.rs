//! Report lifecycle: submission with media staging, asynchronous
//! verification, operator dispositions, browsing, and the dashboard roll-up.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::events::Event;
use shorewatch_common::types::{
    BulkOutcome, MediaAttachment, MediaKind, MlAnalysis, NearQuery, Report, ReportDraft,
    ReportFilter, ReportStats, ReportStatus,
};

use crate::deps::PipelineDeps;
use crate::traits::MediaUpload;
use crate::verify;

/// Upload cap per report, matching the submission form.
const MAX_MEDIA_FILES: usize = 5;

/// How many reports the stats roll-up lists.
const RECENT_REPORTS: usize = 10;

#[derive(Clone)]
pub struct ReportPipeline {
    deps: PipelineDeps,
}

impl ReportPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Stage any media, persist the report `pending`, index its location,
    /// publish, and hand it to the verification task. Returns as soon as the
    /// report is stored; the oracle runs behind the submitter's back.
    pub async fn submit(
        &self,
        draft: ReportDraft,
        uploads: Vec<MediaUpload>,
        now: DateTime<Utc>,
    ) -> Result<Report, ShorewatchError> {
        if draft.title.trim().is_empty() {
            return Err(ShorewatchError::Validation(
                "report title must not be empty".into(),
            ));
        }
        if draft.description.trim().is_empty() {
            return Err(ShorewatchError::Validation(
                "report description must not be empty".into(),
            ));
        }
        if !draft.location.is_valid() {
            return Err(ShorewatchError::Validation(format!(
                "report location ({}, {}) is out of range",
                draft.location.lat, draft.location.lng
            )));
        }
        if uploads.len() > MAX_MEDIA_FILES {
            return Err(ShorewatchError::Validation(format!(
                "at most {MAX_MEDIA_FILES} media files per report, got {}",
                uploads.len()
            )));
        }

        // Stage uploads before anything else is persisted; a rejected or
        // failed upload leaves no report behind.
        let mut media = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            let kind = MediaKind::from_mime(&upload.mime).ok_or_else(|| {
                ShorewatchError::Validation(format!(
                    "unsupported media type {} for {}",
                    upload.mime, upload.filename
                ))
            })?;
            let stored = self
                .deps
                .media_store
                .store(upload)
                .await
                .map_err(ShorewatchError::infrastructure)?;
            media.push(MediaAttachment {
                kind,
                url: stored.url,
                key: stored.key,
            });
        }

        let report = Report {
            id: Uuid::new_v4(),
            reporter_id: draft.reporter_id,
            title: draft.title,
            description: draft.description,
            hazard: draft.hazard,
            severity: draft.severity,
            location: draft.location,
            address: draft.address,
            media,
            status: ReportStatus::Pending,
            verification_score: 0.0,
            ml_analysis: None,
            is_emergency: draft.is_emergency,
            view_count: 0,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.deps
            .spatial_writer
            .upsert_report_location(report.id, report.location)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        if let Err(error) = self.deps.report_store.insert_report(&report).await {
            let _ = self
                .deps
                .spatial_writer
                .remove_report_location(report.id)
                .await;
            return Err(ShorewatchError::infrastructure(error));
        }

        info!(
            report_id = %report.id,
            hazard = %report.hazard,
            severity = %report.severity,
            emergency = report.is_emergency,
            "Report submitted"
        );
        self.deps.bus.publish(Event::NewReport {
            report: report.clone(),
        });
        verify::dispatch(self.deps.clone(), report.clone());
        Ok(report)
    }

    /// Record the oracle's judgment. Touches only `ml_analysis` and
    /// `verification_score`; `status` stays wherever it is. A result for a
    /// report deleted in the meantime is discarded.
    pub async fn apply_verification(
        &self,
        report_id: Uuid,
        analysis: MlAnalysis,
        now: DateTime<Utc>,
    ) -> Result<(), ShorewatchError> {
        let score = self
            .deps
            .config
            .verification
            .score_for(analysis.fake_detection.is_fake);
        let applied = self
            .deps
            .report_store
            .apply_analysis(report_id, &analysis, score, now)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        if applied {
            info!(
                report_id = %report_id,
                score,
                fake = analysis.fake_detection.is_fake,
                "Verification result applied"
            );
        } else {
            debug!(report_id = %report_id, "Verification result discarded, report gone");
        }
        Ok(())
    }

    /// Move a report to an operator disposition. `pending` is entry-only and
    /// rejected here; verified, rejected and investigating move freely among
    /// themselves.
    pub async fn set_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        operator_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), ShorewatchError> {
        if status == ReportStatus::Pending {
            return Err(ShorewatchError::Validation(
                "reports cannot be moved back to pending".into(),
            ));
        }
        let updated = self
            .deps
            .report_store
            .set_status(report_id, status, operator_id, now)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        if !updated {
            return Err(ShorewatchError::NotFound(format!("report {report_id}")));
        }
        info!(
            report_id = %report_id,
            status = %status,
            reviewer = %operator_id,
            "Report status updated"
        );
        self.deps
            .bus
            .publish(Event::ReportStatusUpdate { report_id, status });
        Ok(())
    }

    /// Best-effort bulk disposition. The target status is validated once up
    /// front; after that, unknown ids are counted and skipped rather than
    /// failing the batch.
    pub async fn bulk_set_status(
        &self,
        report_ids: &[Uuid],
        status: ReportStatus,
        operator_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BulkOutcome, ShorewatchError> {
        if status == ReportStatus::Pending {
            return Err(ShorewatchError::Validation(
                "reports cannot be moved back to pending".into(),
            ));
        }
        let mut outcome = BulkOutcome::default();
        for &report_id in report_ids {
            let updated = self
                .deps
                .report_store
                .set_status(report_id, status, operator_id, now)
                .await
                .map_err(ShorewatchError::infrastructure)?;
            if updated {
                outcome.updated += 1;
                self.deps
                    .bus
                    .publish(Event::ReportStatusUpdate { report_id, status });
            } else {
                outcome.skipped += 1;
            }
        }
        info!(
            status = %status,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "Bulk status update"
        );
        Ok(outcome)
    }

    /// Bump the view counter. Concurrent bumps all land.
    pub async fn record_view(&self, report_id: Uuid) -> Result<u64, ShorewatchError> {
        let report = self
            .deps
            .report_store
            .increment_views(report_id)
            .await
            .map_err(ShorewatchError::infrastructure)?
            .ok_or_else(|| ShorewatchError::NotFound(format!("report {report_id}")))?;
        Ok(report.view_count)
    }

    /// Fetch by id, counting the view.
    pub async fn fetch(&self, report_id: Uuid) -> Result<Report, ShorewatchError> {
        self.deps
            .report_store
            .increment_views(report_id)
            .await
            .map_err(ShorewatchError::infrastructure)?
            .ok_or_else(|| ShorewatchError::NotFound(format!("report {report_id}")))
    }

    /// Remove a report and its spatial point. A verification result still in
    /// flight for it is discarded when it lands.
    pub async fn delete(&self, report_id: Uuid) -> Result<(), ShorewatchError> {
        let removed = self
            .deps
            .report_store
            .delete_report(report_id)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        if !removed {
            return Err(ShorewatchError::NotFound(format!("report {report_id}")));
        }
        self.deps
            .spatial_writer
            .remove_report_location(report_id)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        info!(report_id = %report_id, "Report deleted");
        Ok(())
    }

    /// Filtered browse. With a geo constraint results come back closest
    /// first; without one, newest first. A center without a radius uses the
    /// configured default.
    pub async fn search(
        &self,
        filter: ReportFilter,
        near: Option<NearQuery>,
    ) -> Result<Vec<Report>, ShorewatchError> {
        let Some(query) = near else {
            return self
                .deps
                .report_store
                .filter_reports(&filter)
                .await
                .map_err(ShorewatchError::infrastructure);
        };

        if !query.center.is_valid() {
            return Err(ShorewatchError::Validation(format!(
                "search center ({}, {}) is out of range",
                query.center.lat, query.center.lng
            )));
        }
        let radius_m = query
            .radius_m
            .unwrap_or(self.deps.config.default_search_radius_m);
        if !radius_m.is_finite() || radius_m < 0.0 {
            return Err(ShorewatchError::Validation(format!(
                "search radius {radius_m} is invalid"
            )));
        }

        let ids = self
            .deps
            .spatial_reader
            .reports_within_radius(query.center, radius_m)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        let reports = self
            .deps
            .report_store
            .reports_by_ids(&ids)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        Ok(reports.into_iter().filter(|r| filter.matches(r)).collect())
    }

    /// Operator dashboard roll-up.
    pub async fn stats(&self) -> Result<ReportStats, ShorewatchError> {
        self.deps
            .report_store
            .stats(RECENT_REPORTS)
            .await
            .map_err(ShorewatchError::infrastructure)
    }
}
