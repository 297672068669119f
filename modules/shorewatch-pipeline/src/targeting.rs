//! Alert targeting: resolving a polygon to the users it covers.

use std::sync::Arc;

use tracing::{info, warn};

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::geo::Polygon;
use shorewatch_common::types::Recipient;

use crate::traits::SpatialReader;

/// Materializes per-user delivery records for an alert's polygon.
///
/// Fail-closed: if the spatial reader cannot answer, targeting fails and the
/// alert must not be created. An under-targeted alert is worse than no alert.
#[derive(Clone)]
pub struct AlertTargeter {
    spatial: Arc<dyn SpatialReader>,
}

impl AlertTargeter {
    pub fn new(spatial: Arc<dyn SpatialReader>) -> Self {
        Self { spatial }
    }

    /// One spatial query, one recipient per matched user, reader order
    /// preserved. The caller validates the polygon first, so a failure here
    /// is always infrastructure.
    pub async fn target(&self, area: &Polygon) -> Result<Vec<Recipient>, ShorewatchError> {
        let users = match self.spatial.users_in_polygon(area).await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "Spatial index unavailable, refusing to target");
                return Err(ShorewatchError::TargetingUnavailable(format!("{e:#}")));
            }
        };

        let mut recipients: Vec<Recipient> = Vec::with_capacity(users.len());
        for user_id in users {
            if recipients.iter().any(|r| r.user_id == user_id) {
                continue;
            }
            recipients.push(Recipient::new(user_id));
        }

        info!(recipients = recipients.len(), "Alert targeting resolved");
        Ok(recipients)
    }
}
