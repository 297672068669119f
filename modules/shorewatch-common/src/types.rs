use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{GeoPoint, Polygon};

// --- Alert enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Warning,
    Evacuation,
    AllClear,
    WeatherUpdate,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Warning => write!(f, "warning"),
            AlertKind::Evacuation => write!(f, "evacuation"),
            AlertKind::AllClear => write!(f, "all_clear"),
            AlertKind::WeatherUpdate => write!(f, "weather_update"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Minor => write!(f, "minor"),
            AlertSeverity::Moderate => write!(f, "moderate"),
            AlertSeverity::Severe => write!(f, "severe"),
            AlertSeverity::Extreme => write!(f, "extreme"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    App,
    Sms,
    Email,
    SocialMedia,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::App => write!(f, "app"),
            Channel::Sms => write!(f, "sms"),
            Channel::Email => write!(f, "email"),
            Channel::SocialMedia => write!(f, "social_media"),
        }
    }
}

// --- Report enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    Cyclone,
    Tsunami,
    Flood,
    StormSurge,
    Other,
}

impl std::fmt::Display for HazardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HazardKind::Cyclone => write!(f, "cyclone"),
            HazardKind::Tsunami => write!(f, "tsunami"),
            HazardKind::Flood => write!(f, "flood"),
            HazardKind::StormSurge => write!(f, "storm_surge"),
            HazardKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ReportSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportSeverity::Low => write!(f, "low"),
            ReportSeverity::Medium => write!(f, "medium"),
            ReportSeverity::High => write!(f, "high"),
            ReportSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Disposition of a citizen report. `Pending` is entry-only: a report starts
/// there and never returns once an operator or the verification pipeline has
/// moved it on. The three reviewed states are freely inter-movable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Verified,
    Rejected,
    Investigating,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::Verified => write!(f, "verified"),
            ReportStatus::Rejected => write!(f, "rejected"),
            ReportStatus::Investigating => write!(f, "investigating"),
        }
    }
}

// --- Media ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classifies a MIME type by its prefix. Anything outside
    /// image/video/audio is unsupported.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// A stored media object attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
    pub key: String,
}

// --- Verification analysis ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FakeDetection {
    pub is_fake: bool,
    pub confidence: f64,
}

/// Opaque judgment returned by the verification oracle. Shorewatch stores it
/// verbatim; only `fake_detection.is_fake` feeds the score policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MlAnalysis {
    pub sentiment: String,
    pub confidence: f64,
    pub keywords: Vec<String>,
    pub fake_detection: FakeDetection,
}

// --- Callers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    GovOfficer,
    Admin,
}

impl Role {
    /// The stock permission set for this role.
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            Role::Citizen => vec![
                Permission::CreateReport,
                Permission::ViewOwnReports,
                Permission::SendSos,
            ],
            Role::GovOfficer => vec![
                Permission::ViewAllReports,
                Permission::VerifyReports,
                Permission::CreateAlerts,
            ],
            Role::Admin => vec![
                Permission::ViewAllReports,
                Permission::VerifyReports,
                Permission::CreateAlerts,
                Permission::ManageUsers,
            ],
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Role::GovOfficer | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Citizen => write!(f, "citizen"),
            Role::GovOfficer => write!(f, "gov_officer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateReport,
    ViewOwnReports,
    SendSos,
    ViewAllReports,
    VerifyReports,
    CreateAlerts,
    ManageUsers,
}

/// An authenticated identity as handed over by the auth layer. Permissions
/// default from the role; the auth layer may grant extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            permissions: role.default_permissions(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

// --- Alerts ---

/// Per-user delivery record, materialized once when the alert is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: Uuid,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Recipient {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            delivered_at: None,
            read_at: None,
        }
    }
}

/// A geotargeted public-safety alert. `recipients` is a snapshot of the
/// users inside `area` at creation time and is never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub area: Polygon,
    pub issued_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub channels: Vec<Channel>,
    pub recipients: Vec<Recipient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Input for alert creation, before validation and targeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDraft {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub area: Polygon,
    pub issued_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub channels: Vec<Channel>,
}

// --- Reports ---

/// A citizen hazard report and its verification state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub title: String,
    pub description: String,
    pub hazard: HazardKind,
    pub severity: ReportSeverity,
    pub location: GeoPoint,
    pub address: String,
    pub media: Vec<MediaAttachment>,
    pub status: ReportStatus,
    pub verification_score: f64,
    pub ml_analysis: Option<MlAnalysis>,
    pub is_emergency: bool,
    pub view_count: u64,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for report submission. Media arrives separately as raw uploads and
/// is stored before the report record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDraft {
    pub reporter_id: Uuid,
    pub title: String,
    pub description: String,
    pub hazard: HazardKind,
    pub severity: ReportSeverity,
    pub location: GeoPoint,
    pub address: String,
    pub is_emergency: bool,
}

// --- Report queries ---

/// Attribute filter for report browsing. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub hazard: Option<HazardKind>,
    pub status: Option<ReportStatus>,
    pub severity: Option<ReportSeverity>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.hazard.map_or(true, |h| report.hazard == h)
            && self.status.map_or(true, |s| report.status == s)
            && self.severity.map_or(true, |s| report.severity == s)
    }
}

/// Geographic constraint for report browsing. A missing radius falls back to
/// the configured default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NearQuery {
    pub center: GeoPoint,
    pub radius_m: Option<f64>,
}

/// Operator dashboard roll-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStats {
    pub total: u64,
    pub pending: u64,
    pub verified: u64,
    pub emergency: u64,
    pub recent: Vec<Report>,
}

/// Outcome of a bulk status update: ids updated vs. ids skipped because no
/// such report exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub updated: u64,
    pub skipped: u64,
}
