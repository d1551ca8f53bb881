use async_trait::async_trait;
use common::StateStore;
use std::sync::Arc;
use telemetry::metrics::{ACTIVE_ALERTS, ALERTS_CREATED, ALERTS_RESOLVED};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::IncidentError;
use crate::persistence::{decode_list, load_list, save_list, Decoded, Loaded};
use crate::seed;
use crate::stamp::{next_id, now_timestamp, JUST_NOW};
use crate::sync::{apply_decoded, SyncTarget};
use crate::types::*;

/// Storage key holding the serialized alert list
pub const ALERTS_KEY: &str = "unifap-alerta-alerts";

/// Resolver recorded when the acting administrator has no name
pub const DEFAULT_ADMIN: &str = "Administrador";

/// Public alerts, newest first
pub struct AlertStore {
    alerts: RwLock<Vec<Alert>>,
    state: Arc<dyn StateStore>,
    origin: Uuid,
}

impl AlertStore {
    pub async fn open(state: Arc<dyn StateStore>) -> Self {
        Self::open_with_origin(state, Uuid::new_v4()).await
    }

    /// Open with a caller-chosen writer identity, shared with sibling stores
    pub async fn open_with_origin(state: Arc<dyn StateStore>, origin: Uuid) -> Self {
        let (alerts, write_seed) = match load_list::<Alert>(state.as_ref(), ALERTS_KEY).await {
            Loaded::Found(Decoded::Records(alerts)) if !alerts.is_empty() => {
                info!(count = alerts.len(), "alerts loaded from storage");
                (alerts, false)
            }
            // Stored data exists but cannot be used right now: seed in memory
            // only, so the stored list survives for a later reload
            Loaded::Unavailable => {
                warn!("alert storage unreadable, using seed data in memory only");
                (seed::initial_alerts(), false)
            }
            Loaded::Found(Decoded::Unreadable { skipped }) => {
                warn!(skipped, "no stored alert readable, using seed data in memory only");
                (seed::initial_alerts(), false)
            }
            Loaded::Found(Decoded::Malformed(error)) => {
                warn!(error = %error, "stored alerts unreadable, falling back to seed data");
                (seed::initial_alerts(), true)
            }
            _ => {
                info!("no stored alerts, loading seed data");
                (seed::initial_alerts(), true)
            }
        };

        if write_seed {
            save_list(state.as_ref(), ALERTS_KEY, &alerts, origin).await;
        }
        record_gauge(&alerts);

        Self {
            alerts: RwLock::new(alerts),
            state,
            origin,
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Re-read the alert list from durable storage; last writer wins
    pub async fn reload(&self) -> bool {
        self.refresh_from_storage().await
    }

    pub(crate) fn records(&self) -> &RwLock<Vec<Alert>> {
        &self.alerts
    }

    async fn persist(&self, alerts: &[Alert]) {
        save_list(self.state.as_ref(), ALERTS_KEY, alerts, self.origin).await;
        record_gauge(alerts);
    }

    pub async fn add_alert(&self, new: NewAlert) -> Result<Alert, IncidentError> {
        new.validate()?;

        let mut alerts = self.alerts.write().await;
        let id = next_id(alerts.iter().map(|a| a.id));
        let alert = build_alert(id, new, now_timestamp());
        alerts.insert(0, alert.clone());
        self.persist(&alerts).await;

        ALERTS_CREATED.inc();
        info!(
            alert_id = alert.id,
            category = %alert.category,
            urgency = %alert.urgency,
            "alert published"
        );
        Ok(alert)
    }

    /// Resolve an active alert. Re-resolving keeps the original resolver.
    pub async fn resolve_alert(&self, id: i64, resolved_by: &str) -> ResolveOutcome {
        let mut alerts = self.alerts.write().await;
        let Some(alert) = alerts.iter_mut().find(|a| a.id == id) else {
            debug!(alert_id = id, "resolve ignored, alert not found");
            return ResolveOutcome::NotFound;
        };

        if alert.is_resolved() {
            debug!(alert_id = id, resolved_by = ?alert.resolved_by, "alert already resolved");
            return ResolveOutcome::AlreadyResolved(alert.clone());
        }

        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(now_timestamp());
        alert.resolved_by = Some(admin_or_default(resolved_by));
        let resolved = alert.clone();
        self.persist(&alerts).await;

        ALERTS_RESOLVED.inc();
        info!(alert_id = id, resolved_by = ?resolved.resolved_by, "alert resolved");
        ResolveOutcome::Resolved(resolved)
    }

    /// Hard delete; returns false when nothing matched
    pub async fn delete_alert(&self, id: i64) -> bool {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        if alerts.len() == before {
            return false;
        }
        self.persist(&alerts).await;
        info!(alert_id = id, "alert deleted");
        true
    }

    pub async fn get_alert(&self, id: i64) -> Option<Alert> {
        self.alerts.read().await.iter().find(|a| a.id == id).cloned()
    }

    pub async fn list_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn get_active_alerts(&self) -> Vec<Alert> {
        self.filtered(Alert::is_active).await
    }

    pub async fn get_resolved_alerts(&self) -> Vec<Alert> {
        self.filtered(Alert::is_resolved).await
    }

    async fn filtered(&self, keep: fn(&Alert) -> bool) -> Vec<Alert> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|a| keep(a))
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> AlertStats {
        let alerts = self.alerts.read().await;
        alerts.iter().fold(
            AlertStats {
                total: alerts.len(),
                ..Default::default()
            },
            |mut stats, alert| {
                match alert.status {
                    AlertStatus::Active => {
                        stats.active += 1;
                        if alert.urgency == Urgency::Critical {
                            stats.critical_active += 1;
                        }
                    }
                    AlertStatus::Resolved => stats.resolved += 1,
                }
                stats
            },
        )
    }
}

#[async_trait]
impl SyncTarget for AlertStore {
    fn storage_key(&self) -> &'static str {
        ALERTS_KEY
    }

    fn origin(&self) -> Uuid {
        self.origin
    }

    fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    async fn apply_external(&self, new_value: Option<&str>) -> bool {
        let decoded = match new_value {
            Some(raw) => decode_list(ALERTS_KEY, raw),
            None => Decoded::Records(Vec::new()),
        };
        let mut alerts = self.alerts.write().await;
        let replaced = apply_decoded(&mut *alerts, decoded, ALERTS_KEY);
        if replaced {
            record_gauge(&alerts);
        }
        replaced
    }
}

pub(crate) fn record_gauge(alerts: &[Alert]) {
    let active = alerts.iter().filter(|a| a.is_active()).count();
    ACTIVE_ALERTS.set(i64::try_from(active).unwrap_or(i64::MAX));
}

pub(crate) fn admin_or_default(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_ADMIN.to_string()
    } else {
        name.to_string()
    }
}

pub(crate) fn build_alert(id: i64, new: NewAlert, created_at: String) -> Alert {
    Alert {
        id,
        kind: new.category.label().to_string(),
        title: new.title,
        description: new.description,
        location: new.location,
        created_by: new.created_by,
        created_at,
        time_ago: JUST_NOW.to_string(),
        status: AlertStatus::Active,
        urgency: new.urgency,
        category: new.category,
        resolved_at: None,
        resolved_by: None,
    }
}

/// Public alert announcing a promoted ticket
pub(crate) fn alert_from_ticket(id: i64, ticket: &Ticket, admin: &str, created_at: String) -> Alert {
    let new = NewAlert {
        title: format!("📢 {}", ticket.title),
        description: format!(
            "{}\n\n👤 Reportado originalmente por: {}\n🔄 Convertido em alerta público pela administração",
            ticket.description, ticket.created_by
        ),
        location: ticket.location.clone(),
        category: ticket.category,
        urgency: ticket.urgency,
        created_by: admin_or_default(admin),
    };
    build_alert(id, new, created_at)
}
