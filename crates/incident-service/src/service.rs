//! Incident service: both stores behind one writer identity
//!
//! Owns the alert and ticket stores, performs the ticket-to-alert promotion
//! atomically and puts every destructive admin action behind a
//! [`Confirmation`] gate.

use common::StateStore;
use std::sync::Arc;
use telemetry::metrics::{ALERTS_CREATED, CONVERSIONS, STORAGE_FAILURES};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alert_store::{self, alert_from_ticket, AlertStore, ALERTS_KEY};
use crate::error::IncidentError;
use crate::persistence::encode_list;
use crate::stamp::{next_id, now_timestamp};
use crate::submit::{SubmitGate, SubmitLatency};
use crate::ticket_store::{self, apply_conversion, TicketStore, TICKETS_KEY};
use crate::types::*;

/// Destructive admin actions that require confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    ResolveAlert,
    DeleteAlert,
    ResolveTicket,
    DeleteTicket,
    ConvertTicket,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::ResolveAlert => "resolve_alert",
            AdminAction::DeleteAlert => "delete_alert",
            AdminAction::ResolveTicket => "resolve_ticket",
            AdminAction::DeleteTicket => "delete_ticket",
            AdminAction::ConvertTicket => "convert_ticket",
        }
    }
}

/// What the administrator is asked to approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub action: AdminAction,
    /// Title of the affected record
    pub subject: String,
    pub notes: Option<String>,
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self.action {
            AdminAction::ResolveAlert => format!(
                "Tem certeza que deseja marcar o alerta \"{}\" como resolvido?\n\nEsta ação notificará todos os usuários.",
                self.subject
            ),
            AdminAction::DeleteAlert => format!(
                "Tem certeza que deseja excluir o alerta \"{}\"?\n\nEsta ação não pode ser desfeita.",
                self.subject
            ),
            AdminAction::ResolveTicket => {
                let notes = self
                    .notes
                    .as_deref()
                    .map(|n| format!("Notas: {}\n\n", n))
                    .unwrap_or_default();
                format!(
                    "✅ RESOLVER CHAMADO\n\nMarcar \"{}\" como resolvido?\n\n{}Confirmar resolução?",
                    self.subject, notes
                )
            }
            AdminAction::DeleteTicket => format!(
                "🗑️ EXCLUIR CHAMADO\n\nTem certeza que deseja excluir permanentemente o chamado \"{}\"?\n\nEsta ação não pode ser desfeita.",
                self.subject
            ),
            AdminAction::ConvertTicket => format!(
                "🔊 CONVERTER EM ALERTA PÚBLICO\n\nDeseja transformar este chamado em um alerta público?\n\n\"{}\"\n\nProsseguir?",
                self.subject
            ),
        }
    }
}

/// Asks the operator to approve a destructive action
pub trait Confirmation: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&ConfirmPrompt) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmation for AlwaysConfirm {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

impl Confirmation for NeverConfirm {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        false
    }
}

/// Result of a gated admin action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome<T> {
    Completed(T),
    /// Declined at the confirmation prompt; nothing changed
    Cancelled,
}

impl<T> AdminOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdminOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            AdminOutcome::Completed(value) => Some(value),
            AdminOutcome::Cancelled => None,
        }
    }
}

pub struct IncidentService {
    alerts: Arc<AlertStore>,
    tickets: Arc<TicketStore>,
    state: Arc<dyn StateStore>,
    origin: Uuid,
    confirm: Arc<dyn Confirmation>,
    ticket_gate: SubmitGate,
    alert_gate: SubmitGate,
}

impl IncidentService {
    pub async fn open(
        state: Arc<dyn StateStore>,
        confirm: Arc<dyn Confirmation>,
        latency: SubmitLatency,
    ) -> Self {
        let origin = Uuid::new_v4();
        let alerts = Arc::new(AlertStore::open_with_origin(state.clone(), origin).await);
        let tickets = Arc::new(TicketStore::open_with_origin(state.clone(), origin).await);
        info!(origin = %origin, "incident service opened");

        Self {
            alerts,
            tickets,
            state,
            origin,
            confirm,
            ticket_gate: SubmitGate::new("ticket", latency.ticket),
            alert_gate: SubmitGate::new("alert", latency.alert),
        }
    }

    pub fn alerts(&self) -> &Arc<AlertStore> {
        &self.alerts
    }

    pub fn tickets(&self) -> &Arc<TicketStore> {
        &self.tickets
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Student-facing ticket submission
    pub async fn submit_ticket(&self, new: NewTicket) -> Result<Ticket, IncidentError> {
        new.validate()?;
        self.ticket_gate
            .run(|| self.tickets.add_ticket(new))
            .await
    }

    /// Admin-facing alert publication
    pub async fn publish_alert(&self, new: NewAlert) -> Result<Alert, IncidentError> {
        new.validate()?;
        self.alert_gate.run(|| self.alerts.add_alert(new)).await
    }

    /// Promote a ticket to a public alert in one step
    ///
    /// Both lists change under their write locks and reach storage in a single
    /// batch. Returns `None` when the ticket is missing or already closed.
    pub async fn convert_ticket_to_alert(&self, ticket_id: i64, admin: &str) -> Option<Alert> {
        let mut alerts = self.alerts.records().write().await;
        let mut tickets = self.tickets.records().write().await;

        let Some(ticket) = tickets.iter().find(|t| t.id == ticket_id).cloned() else {
            debug!(ticket_id, "conversion ignored, ticket not found");
            return None;
        };
        if !ticket.status.can_transition_to(TicketStatus::ConvertedToAlert) {
            warn!(ticket_id, status = %ticket.status, "ticket cannot be converted");
            return None;
        }

        let stamp = now_timestamp();
        let alert = alert_from_ticket(
            next_id(alerts.iter().map(|a| a.id)),
            &ticket,
            admin,
            stamp.clone(),
        );
        alerts.insert(0, alert.clone());
        apply_conversion(&mut tickets, ticket_id, alert.id, stamp);

        let batch: Option<Vec<(String, String)>> = [
            encode_list(ALERTS_KEY, alerts.as_slice()).map(|raw| (ALERTS_KEY.to_string(), raw)),
            encode_list(TICKETS_KEY, tickets.as_slice()).map(|raw| (TICKETS_KEY.to_string(), raw)),
        ]
        .into_iter()
        .collect();
        if let Some(batch) = batch {
            if let Err(e) = self.state.set_many(&batch, self.origin).await {
                warn!(ticket_id, error = %e, "failed to persist conversion, keeping in-memory state");
                STORAGE_FAILURES
                    .with_label_values(&[TICKETS_KEY, "write_batch"])
                    .inc();
            }
        }

        alert_store::record_gauge(&alerts);
        ticket_store::record_gauge(&tickets);
        ALERTS_CREATED.inc();
        CONVERSIONS.inc();
        info!(ticket_id, alert_id = alert.id, admin = %alert.created_by, "ticket promoted to public alert");
        Some(alert)
    }

    fn ask(&self, action: AdminAction, subject: &str, notes: Option<&str>) -> bool {
        let prompt = ConfirmPrompt {
            action,
            subject: subject.to_string(),
            notes: notes.map(str::to_string),
        };
        let confirmed = self.confirm.confirm(&prompt);
        if !confirmed {
            info!(action = action.as_str(), subject = %subject, "admin action cancelled");
        }
        confirmed
    }

    pub async fn resolve_alert(&self, id: i64, admin: &str) -> AdminOutcome<ResolveOutcome> {
        let Some(alert) = self.alerts.get_alert(id).await else {
            return AdminOutcome::Completed(ResolveOutcome::NotFound);
        };
        // Already resolved: nothing to confirm, the store reports it unchanged
        if alert.is_active() && !self.ask(AdminAction::ResolveAlert, &alert.title, None) {
            return AdminOutcome::Cancelled;
        }
        AdminOutcome::Completed(self.alerts.resolve_alert(id, admin).await)
    }

    pub async fn delete_alert(&self, id: i64) -> AdminOutcome<bool> {
        let Some(alert) = self.alerts.get_alert(id).await else {
            return AdminOutcome::Completed(false);
        };
        if !self.ask(AdminAction::DeleteAlert, &alert.title, None) {
            return AdminOutcome::Cancelled;
        }
        AdminOutcome::Completed(self.alerts.delete_alert(id).await)
    }

    pub async fn resolve_ticket(
        &self,
        id: i64,
        admin_notes: Option<String>,
        admin: &str,
    ) -> Result<AdminOutcome<StatusOutcome>, IncidentError> {
        validate_notes(admin_notes.as_deref())?;
        let Some(ticket) = self.tickets.get_ticket(id).await else {
            return Ok(AdminOutcome::Completed(StatusOutcome::NotFound));
        };
        let resolvable = ticket.status.can_transition_to(TicketStatus::Resolved);
        if resolvable && !self.ask(AdminAction::ResolveTicket, &ticket.title, admin_notes.as_deref()) {
            return Ok(AdminOutcome::Cancelled);
        }
        let outcome = self
            .tickets
            .update_ticket_status(id, TicketStatus::Resolved, admin_notes, Some(admin.to_string()))
            .await?;
        Ok(AdminOutcome::Completed(outcome))
    }

    pub async fn delete_ticket(&self, id: i64) -> AdminOutcome<bool> {
        let Some(ticket) = self.tickets.get_ticket(id).await else {
            return AdminOutcome::Completed(false);
        };
        if !self.ask(AdminAction::DeleteTicket, &ticket.title, None) {
            return AdminOutcome::Cancelled;
        }
        AdminOutcome::Completed(self.tickets.delete_ticket(id).await)
    }

    pub async fn convert_ticket(&self, id: i64, admin: &str) -> AdminOutcome<Option<Alert>> {
        let Some(ticket) = self.tickets.get_ticket(id).await else {
            return AdminOutcome::Completed(None);
        };
        let convertible = ticket.status.can_transition_to(TicketStatus::ConvertedToAlert);
        if convertible && !self.ask(AdminAction::ConvertTicket, &ticket.title, None) {
            return AdminOutcome::Cancelled;
        }
        AdminOutcome::Completed(self.convert_ticket_to_alert(id, admin).await)
    }
}
