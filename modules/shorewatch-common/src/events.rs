use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Alert, Report, ReportStatus};

/// Lifecycle events broadcast to connected observers. Delivery is best
/// effort: publishing never blocks, and observers that fall behind miss
/// events rather than slowing the publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NewAlert {
        alert: Alert,
        target_users: Vec<Uuid>,
    },
    AlertDeactivated {
        alert_id: Uuid,
    },
    NewReport {
        report: Report,
    },
    ReportStatusUpdate {
        report_id: Uuid,
        status: ReportStatus,
    },
}

impl Event {
    /// Stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::NewAlert { .. } => "new_alert",
            Event::AlertDeactivated { .. } => "alert_deactivated",
            Event::NewReport { .. } => "new_report",
            Event::ReportStatusUpdate { .. } => "report_status_update",
        }
    }
}
