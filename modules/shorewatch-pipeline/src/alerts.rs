//! Alert lifecycle: creation with fail-closed targeting, deactivation, read
//! receipts, expiry sweeps, and the role-gated feed.

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shorewatch_common::error::ShorewatchError;
use shorewatch_common::events::Event;
use shorewatch_common::types::{Alert, AlertDraft, Caller, Channel};

use crate::deps::PipelineDeps;
use crate::targeting::AlertTargeter;
use crate::traits::Transition;

#[derive(Clone)]
pub struct AlertPipeline {
    deps: PipelineDeps,
    targeter: AlertTargeter,
}

impl AlertPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let targeter = AlertTargeter::new(deps.spatial_reader.clone());
        Self { deps, targeter }
    }

    /// Validate, target, persist, register the polygon, publish. Recipients
    /// are resolved exactly once, here; the snapshot is never recomputed.
    pub async fn create(
        &self,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<Alert, ShorewatchError> {
        if draft.title.trim().is_empty() {
            return Err(ShorewatchError::Validation(
                "alert title must not be empty".into(),
            ));
        }
        if draft.message.trim().is_empty() {
            return Err(ShorewatchError::Validation(
                "alert message must not be empty".into(),
            ));
        }
        draft.area.validate()?;
        if draft.expires_at <= now {
            return Err(ShorewatchError::Validation(format!(
                "expiry {} is not in the future",
                draft.expires_at
            )));
        }

        let recipients = self.targeter.target(&draft.area).await?;
        let channels = if draft.channels.is_empty() {
            vec![Channel::App]
        } else {
            draft.channels
        };

        let alert = Alert {
            id: Uuid::new_v4(),
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            severity: draft.severity,
            area: draft.area,
            issued_by: draft.issued_by,
            expires_at: draft.expires_at,
            active: true,
            channels,
            recipients,
            created_at: now,
            updated_at: now,
        };

        // Register the polygon before persisting; a failed insert unwinds
        // the registration so neither half survives alone.
        self.deps
            .spatial_writer
            .insert_alert_area(alert.id, &alert.area)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        if let Err(error) = self.deps.alert_store.insert_alert(&alert).await {
            let _ = self.deps.spatial_writer.remove_alert_area(alert.id).await;
            return Err(ShorewatchError::infrastructure(error));
        }

        let target_users: Vec<Uuid> = alert.recipients.iter().map(|r| r.user_id).collect();
        info!(
            alert_id = %alert.id,
            kind = %alert.kind,
            severity = %alert.severity,
            recipients = target_users.len(),
            "Alert created"
        );
        self.deps.bus.publish(Event::NewAlert {
            alert: alert.clone(),
            target_users,
        });
        Ok(alert)
    }

    /// Flip to inactive. Idempotent: deactivating an inactive alert succeeds
    /// and publishes nothing.
    pub async fn deactivate(&self, alert_id: Uuid) -> Result<(), ShorewatchError> {
        match self
            .deps
            .alert_store
            .deactivate_alert(alert_id, Utc::now())
            .await
            .map_err(ShorewatchError::infrastructure)?
        {
            Transition::Applied => {
                self.deps
                    .spatial_writer
                    .remove_alert_area(alert_id)
                    .await
                    .map_err(ShorewatchError::infrastructure)?;
                info!(alert_id = %alert_id, "Alert deactivated");
                self.deps.bus.publish(Event::AlertDeactivated { alert_id });
                Ok(())
            }
            Transition::Noop => Ok(()),
            Transition::Missing => Err(ShorewatchError::NotFound(format!("alert {alert_id}"))),
        }
    }

    /// Record that the user read the alert. No-op when already read or when
    /// the user is not a recipient.
    pub async fn mark_read(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), ShorewatchError> {
        match self
            .deps
            .alert_store
            .mark_read(alert_id, user_id, now)
            .await
            .map_err(ShorewatchError::infrastructure)?
        {
            Transition::Applied => {
                debug!(alert_id = %alert_id, user_id = %user_id, "Alert marked read");
                Ok(())
            }
            Transition::Noop => Ok(()),
            Transition::Missing => Err(ShorewatchError::NotFound(format!("alert {alert_id}"))),
        }
    }

    /// Expire every active alert past its expiry. Publishes one deactivation
    /// event per alert this sweep flipped, so a racing explicit deactivation
    /// never doubles up.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, ShorewatchError> {
        let expired = self
            .deps
            .alert_store
            .expire_alerts(now)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        for alert_id in &expired {
            self.deps
                .spatial_writer
                .remove_alert_area(*alert_id)
                .await
                .map_err(ShorewatchError::infrastructure)?;
            self.deps.bus.publish(Event::AlertDeactivated {
                alert_id: *alert_id,
            });
        }
        if !expired.is_empty() {
            info!(expired = expired.len(), "Expired alerts deactivated");
        }
        Ok(expired)
    }

    /// Operators see every active alert; citizens only those covering their
    /// last known location. Newest first.
    pub async fn active_alerts_for(&self, caller: &Caller) -> Result<Vec<Alert>, ShorewatchError> {
        if caller.role.is_operator() {
            return self
                .deps
                .alert_store
                .active_alerts()
                .await
                .map_err(ShorewatchError::infrastructure);
        }

        let Some(location) = self
            .deps
            .spatial_reader
            .user_location(caller.id)
            .await
            .map_err(ShorewatchError::infrastructure)?
        else {
            // Nothing is targeted at a user we cannot place.
            return Ok(Vec::new());
        };
        let ids = self
            .deps
            .spatial_reader
            .alerts_containing(location)
            .await
            .map_err(ShorewatchError::infrastructure)?;
        let mut alerts: Vec<Alert> = self
            .deps
            .alert_store
            .alerts_by_ids(&ids)
            .await
            .map_err(ShorewatchError::infrastructure)?
            .into_iter()
            .filter(|alert| alert.active)
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(alerts)
    }

    /// Fetch by id. Pure read; read receipts go through `mark_read`.
    pub async fn fetch(&self, alert_id: Uuid) -> Result<Alert, ShorewatchError> {
        self.deps
            .alert_store
            .get_alert(alert_id)
            .await
            .map_err(ShorewatchError::infrastructure)?
            .ok_or_else(|| ShorewatchError::NotFound(format!("alert {alert_id}")))
    }
}
