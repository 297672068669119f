//! Shared dependency container for the pipelines.

use std::sync::Arc;

use typed_builder::TypedBuilder;

use shorewatch_common::config::Config;

use crate::bus::NotificationBus;
use crate::traits::{
    AlertStore, MediaStore, ReportStore, SpatialReader, SpatialWriter, VerificationOracle,
};

/// Long-lived, cloneable resources wired once at startup. Both pipelines
/// hold a clone; per-operation state never lives here.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    pub alert_store: Arc<dyn AlertStore>,
    pub report_store: Arc<dyn ReportStore>,
    pub spatial_reader: Arc<dyn SpatialReader>,
    pub spatial_writer: Arc<dyn SpatialWriter>,
    pub media_store: Arc<dyn MediaStore>,
    pub oracle: Arc<dyn VerificationOracle>,
    pub bus: NotificationBus,
    #[builder(default)]
    pub config: Config,
}
