use async_trait::async_trait;
use chrono::Local;
use common::StateStore;
use std::sync::Arc;
use telemetry::metrics::{PENDING_TICKETS, TICKETS_CREATED, TICKET_TRANSITIONS};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::alert_store::admin_or_default;
use crate::error::IncidentError;
use crate::persistence::{decode_list, load_list, save_list, Decoded, Loaded};
use crate::seed;
use crate::stamp::{next_id, now_timestamp};
use crate::sync::{apply_decoded, SyncTarget};
use crate::types::*;

/// Storage key holding the serialized ticket list
pub const TICKETS_KEY: &str = "unifap-tickets";

/// Submitted tickets, newest first
pub struct TicketStore {
    tickets: RwLock<Vec<Ticket>>,
    state: Arc<dyn StateStore>,
    origin: Uuid,
}

impl TicketStore {
    pub async fn open(state: Arc<dyn StateStore>) -> Self {
        Self::open_with_origin(state, Uuid::new_v4()).await
    }

    pub async fn open_with_origin(state: Arc<dyn StateStore>, origin: Uuid) -> Self {
        let tickets = match load_list::<Ticket>(state.as_ref(), TICKETS_KEY).await {
            Loaded::Found(Decoded::Records(tickets)) => {
                info!(count = tickets.len(), "tickets loaded from storage");
                tickets
            }
            Loaded::Found(Decoded::NotAList) => {
                warn!("stored tickets are not a list, starting empty");
                Vec::new()
            }
            Loaded::Found(Decoded::Malformed(e)) => {
                error!(error = %e, "failed to load tickets, starting empty");
                Vec::new()
            }
            Loaded::Found(Decoded::Unreadable { skipped }) => {
                error!(skipped, "no stored ticket readable, starting empty");
                Vec::new()
            }
            Loaded::Unavailable => Vec::new(),
            Loaded::Missing => {
                let examples = seed::example_tickets(Local::now());
                info!(count = examples.len(), "no stored tickets, creating examples");
                save_list(state.as_ref(), TICKETS_KEY, &examples, origin).await;
                examples
            }
        };
        record_gauge(&tickets);

        Self {
            tickets: RwLock::new(tickets),
            state,
            origin,
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Re-read the ticket list from durable storage; last writer wins
    pub async fn reload(&self) -> bool {
        self.refresh_from_storage().await
    }

    pub(crate) fn records(&self) -> &RwLock<Vec<Ticket>> {
        &self.tickets
    }

    async fn persist(&self, tickets: &[Ticket]) {
        save_list(self.state.as_ref(), TICKETS_KEY, tickets, self.origin).await;
        record_gauge(tickets);
    }

    pub async fn add_ticket(&self, new: NewTicket) -> Result<Ticket, IncidentError> {
        new.validate()?;

        let mut tickets = self.tickets.write().await;
        let ticket = Ticket {
            id: next_id(tickets.iter().map(|t| t.id)),
            title: new.title,
            description: new.description,
            category: new.category,
            urgency: new.urgency,
            location: new.location,
            created_by: new.created_by,
            created_at: now_timestamp(),
            status: TicketStatus::Pending,
            admin_notes: None,
            converted_to_alert_id: None,
            resolved_at: None,
            resolved_by: None,
            images: new.images,
        };
        tickets.insert(0, ticket.clone());
        self.persist(&tickets).await;

        TICKETS_CREATED.inc();
        info!(
            ticket_id = ticket.id,
            category = %ticket.category,
            urgency = %ticket.urgency,
            created_by = %ticket.created_by,
            "ticket submitted"
        );
        Ok(ticket)
    }

    /// Move a ticket forward to `in_review` or `resolved`
    ///
    /// Conversion to an alert goes through [`TicketStore::mark_as_converted_to_alert`]
    /// or the service-level conversion, never through here.
    pub async fn update_ticket_status(
        &self,
        id: i64,
        status: TicketStatus,
        admin_notes: Option<String>,
        resolved_by: Option<String>,
    ) -> Result<StatusOutcome, IncidentError> {
        validate_notes(admin_notes.as_deref())?;

        let mut tickets = self.tickets.write().await;
        let Some(ticket) = tickets.iter_mut().find(|t| t.id == id) else {
            debug!(ticket_id = id, "status update ignored, ticket not found");
            return Ok(StatusOutcome::NotFound);
        };

        if status == TicketStatus::ConvertedToAlert || !ticket.status.can_transition_to(status) {
            return Ok(rejected(ticket.status, status, id));
        }

        ticket.status = status;
        ticket.admin_notes = admin_notes.filter(|n| !n.trim().is_empty());
        ticket.resolved_by = resolved_by.map(|name| admin_or_default(&name));
        if status == TicketStatus::Resolved {
            ticket.resolved_at = Some(now_timestamp());
            if ticket.resolved_by.is_none() {
                ticket.resolved_by = Some(admin_or_default(""));
            }
        }
        let updated = ticket.clone();
        self.persist(&tickets).await;

        TICKET_TRANSITIONS
            .with_label_values(&[status.as_str(), "applied"])
            .inc();
        info!(ticket_id = id, status = %status, "ticket status updated");
        Ok(StatusOutcome::Updated(updated))
    }

    pub async fn mark_as_converted_to_alert(&self, id: i64, alert_id: i64) -> StatusOutcome {
        let mut tickets = self.tickets.write().await;
        let outcome = apply_conversion(&mut tickets, id, alert_id, now_timestamp());
        if outcome.is_updated() {
            self.persist(&tickets).await;
        }
        outcome
    }

    /// Hard delete; returns false when nothing matched
    pub async fn delete_ticket(&self, id: i64) -> bool {
        let mut tickets = self.tickets.write().await;
        let before = tickets.len();
        tickets.retain(|t| t.id != id);
        if tickets.len() == before {
            return false;
        }
        self.persist(&tickets).await;
        info!(ticket_id = id, "ticket deleted");
        true
    }

    pub async fn get_ticket(&self, id: i64) -> Option<Ticket> {
        self.tickets.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn list_tickets(&self) -> Vec<Ticket> {
        self.tickets.read().await.clone()
    }

    /// Tickets still waiting on an administrator (pending or in review)
    pub async fn get_pending_tickets(&self) -> Vec<Ticket> {
        self.tickets
            .read()
            .await
            .iter()
            .filter(|t| t.status.is_open())
            .cloned()
            .collect()
    }

    /// Resolved or converted tickets
    pub async fn get_resolved_tickets(&self) -> Vec<Ticket> {
        self.tickets
            .read()
            .await
            .iter()
            .filter(|t| t.status.is_terminal())
            .cloned()
            .collect()
    }

    pub async fn pending_by_urgency(&self) -> TriageBuckets {
        self.get_pending_tickets()
            .await
            .into_iter()
            .fold(TriageBuckets::default(), |mut buckets, ticket| {
                match ticket.urgency {
                    Urgency::Critical => buckets.critical.push(ticket),
                    Urgency::High => buckets.high.push(ticket),
                    Urgency::Medium | Urgency::Low => buckets.other.push(ticket),
                }
                buckets
            })
    }

    pub async fn stats(&self) -> TicketStats {
        let tickets = self.tickets.read().await;
        let mut stats = TicketStats {
            total: tickets.len(),
            ..Default::default()
        };
        for ticket in tickets.iter() {
            match ticket.status {
                TicketStatus::Pending => stats.pending += 1,
                TicketStatus::InReview => stats.in_review += 1,
                TicketStatus::Resolved => stats.resolved += 1,
                TicketStatus::ConvertedToAlert => stats.converted += 1,
            }
        }
        stats
    }
}

#[async_trait]
impl SyncTarget for TicketStore {
    fn storage_key(&self) -> &'static str {
        TICKETS_KEY
    }

    fn origin(&self) -> Uuid {
        self.origin
    }

    fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    async fn apply_external(&self, new_value: Option<&str>) -> bool {
        let decoded = match new_value {
            Some(raw) => decode_list(TICKETS_KEY, raw),
            None => Decoded::Records(Vec::new()),
        };
        let mut tickets = self.tickets.write().await;
        let replaced = apply_decoded(&mut *tickets, decoded, TICKETS_KEY);
        if replaced {
            record_gauge(&tickets);
        }
        replaced
    }
}

fn rejected(current: TicketStatus, requested: TicketStatus, id: i64) -> StatusOutcome {
    TICKET_TRANSITIONS
        .with_label_values(&[requested.as_str(), "rejected"])
        .inc();
    warn!(
        ticket_id = id,
        current = %current,
        requested = %requested,
        "ticket status transition rejected"
    );
    StatusOutcome::Rejected { current, requested }
}

/// Mark a ticket converted in place; shared with the atomic conversion path
pub(crate) fn apply_conversion(
    tickets: &mut [Ticket],
    id: i64,
    alert_id: i64,
    converted_at: String,
) -> StatusOutcome {
    let Some(ticket) = tickets.iter_mut().find(|t| t.id == id) else {
        debug!(ticket_id = id, "conversion ignored, ticket not found");
        return StatusOutcome::NotFound;
    };

    if !ticket.status.can_transition_to(TicketStatus::ConvertedToAlert) {
        return rejected(ticket.status, TicketStatus::ConvertedToAlert, id);
    }

    ticket.status = TicketStatus::ConvertedToAlert;
    ticket.converted_to_alert_id = Some(alert_id);
    ticket.resolved_at = Some(converted_at);

    TICKET_TRANSITIONS
        .with_label_values(&[TicketStatus::ConvertedToAlert.as_str(), "applied"])
        .inc();
    info!(ticket_id = id, alert_id, "ticket converted to alert");
    StatusOutcome::Updated(ticket.clone())
}

pub(crate) fn record_gauge(tickets: &[Ticket]) {
    let pending = tickets.iter().filter(|t| t.status.is_open()).count();
    PENDING_TICKETS.set(i64::try_from(pending).unwrap_or(i64::MAX));
}
