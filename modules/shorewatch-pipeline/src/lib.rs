//! Alert targeting and report verification for the shorewatch platform.
//!
//! Two lifecycles with real invariants live here. `AlertPipeline` resolves
//! which users fall inside a new alert's polygon, persists the recipient
//! snapshot, and fans the alert out over the notification bus. `ReportPipeline`
//! carries a citizen hazard report from submission through asynchronous
//! oracle verification to an operator disposition.
//!
//! Collaborators (persistence, spatial queries, media storage, the
//! verification oracle) sit behind the traits in [`traits`]; the in-memory
//! stores and the HTTP oracle client are the shipped implementations.

pub mod alerts;
pub mod bus;
pub mod deps;
pub mod oracle;
pub mod reports;
pub mod store;
pub mod targeting;
pub mod traits;
mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use alerts::AlertPipeline;
pub use bus::{NotificationBus, Subscriber};
pub use deps::PipelineDeps;
pub use oracle::HttpOracle;
pub use reports::ReportPipeline;
pub use store::{MemoryAlertStore, MemoryReportStore, NoopMediaStore};
pub use targeting::AlertTargeter;
pub use traits::{
    AlertStore, MediaStore, MediaUpload, ReportStore, SpatialReader, SpatialWriter, StoredMedia,
    Transition, VerificationOracle,
};
