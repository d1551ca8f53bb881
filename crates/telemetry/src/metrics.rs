use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Alert Metrics ====
    pub static ref ALERTS_CREATED: IntCounter = {
        let metric = IntCounter::new("incident_alerts_created_total", "Total number of public alerts created")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ALERTS_RESOLVED: IntCounter = {
        let metric = IntCounter::new("incident_alerts_resolved_total", "Total number of alerts marked resolved")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ACTIVE_ALERTS: IntGauge = {
        let metric = IntGauge::new("incident_active_alerts", "Number of active alerts in the last observed store")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Ticket Metrics ====
    pub static ref TICKETS_CREATED: IntCounter = {
        let metric = IntCounter::new("incident_tickets_created_total", "Total number of tickets submitted")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref TICKET_TRANSITIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "incident_ticket_transitions_total",
                "Ticket status transitions by target status and result",
            ),
            &["status", "result"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref PENDING_TICKETS: IntGauge = {
        let metric = IntGauge::new("incident_pending_tickets", "Number of pending or in-review tickets in the last observed store")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CONVERSIONS: IntCounter = {
        let metric = IntCounter::new("incident_conversions_total", "Tickets promoted to public alerts")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Storage Metrics ====
    pub static ref STORAGE_FAILURES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "incident_storage_failures_total",
                "Durable storage reads or writes that failed and were ignored",
            ),
            &["key", "operation"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref STORAGE_SYNC_RELOADS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "incident_storage_sync_reloads_total",
                "Store reloads triggered by another writer or a focus refresh",
            ),
            &["key", "trigger"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Encode the registry in the Prometheus text exposition format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
