//! Background verification dispatch.
//!
//! Submission hands the freshly stored report to a spawned task that asks
//! the oracle for a judgment under a deadline. Success lands through
//! `ReportPipeline::apply_verification`; timeout or oracle failure is a soft
//! fail: logged for operators, invisible to the submitter, the report left
//! `pending` at score zero.

use chrono::Utc;
use tracing::warn;

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::types::Report;

use crate::deps::PipelineDeps;
use crate::reports::ReportPipeline;

/// Spawn the verification task for a just-submitted report. Never blocks,
/// never fails the caller. The task is not cancelled on delete; a late
/// result for a deleted report is discarded when it tries to land.
pub(crate) fn dispatch(deps: PipelineDeps, report: Report) {
    tokio::spawn(async move {
        let deadline = deps.config.oracle_timeout();
        match tokio::time::timeout(deadline, deps.oracle.analyze(&report)).await {
            Ok(Ok(analysis)) => {
                let pipeline = ReportPipeline::new(deps.clone());
                if let Err(e) = pipeline
                    .apply_verification(report.id, analysis, Utc::now())
                    .await
                {
                    warn!(report_id = %report.id, error = %e, "Failed to record verification result");
                }
            }
            Ok(Err(e)) => {
                let soft = ShorewatchError::OracleError(format!("{e:#}"));
                warn!(report_id = %report.id, error = %soft, "Verification failed, report stays pending");
            }
            Err(_) => {
                let soft = ShorewatchError::OracleTimeout(deadline.as_secs());
                warn!(report_id = %report.id, error = %soft, "Verification timed out, report stays pending");
            }
        }
    });
}
