use anyhow::{Context, Result};
use chrono::Local;
use incident_service::stamp::time_ago;
use incident_service::{spawn_sync, AlwaysConfirm, IncidentConfig, IncidentService};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _logging = telemetry::init_with_service("incident-service")?;

    let once = env::args().any(|arg| arg == "--once");

    let config = IncidentConfig::from_env().context("invalid configuration")?;
    info!(
        backend = %config.backend,
        storage_dir = %config.storage_dir.display(),
        version = common::VERSION,
        "Starting incident-service"
    );

    let state = config.open_state_store().await?;
    if !state.health_check().await.context("storage health check failed")? {
        warn!("storage backend reported unhealthy, continuing in memory");
    }

    let service = IncidentService::open(state, Arc::new(AlwaysConfirm), config.submit_latency()).await;

    let alert_sync = spawn_sync(service.alerts().clone());
    let ticket_sync = spawn_sync(service.tickets().clone());

    let alerts = service.alerts().stats().await;
    info!(
        total = alerts.total,
        active = alerts.active,
        resolved = alerts.resolved,
        critical_active = alerts.critical_active,
        "alert dashboard"
    );

    let tickets = service.tickets().stats().await;
    info!(
        total = tickets.total,
        pending = tickets.pending,
        in_review = tickets.in_review,
        resolved = tickets.resolved,
        converted = tickets.converted,
        "ticket dashboard"
    );

    let triage = service.tickets().pending_by_urgency().await;
    let now = Local::now().naive_local();
    for (bucket, list) in [("critical", &triage.critical), ("high", &triage.high), ("other", &triage.other)] {
        for ticket in list.iter() {
            let age = time_ago(&ticket.created_at, now).unwrap_or_else(|| ticket.created_at.clone());
            info!(
                bucket,
                ticket_id = ticket.id,
                title = %ticket.title,
                location = %ticket.location,
                age = %age,
                "pending ticket"
            );
        }
    }

    match telemetry::metrics::encode_metrics() {
        Ok(text) => debug!("metrics:\n{}", text),
        Err(e) => warn!(error = %e, "failed to encode metrics"),
    }

    if once {
        info!("--once given, exiting");
    } else {
        info!("incident-service running, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("shutdown signal received");
    }

    alert_sync.abort();
    ticket_sync.abort();
    Ok(())
}
