use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const REQUESTS_TOTAL: &str = "slotdesk_requests_total";

/// Histogram: request latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "slotdesk_request_duration_seconds";

/// Counter: reservations accepted.
pub const RESERVATIONS_CREATED_TOTAL: &str = "slotdesk_reservations_created_total";

/// Counter: reservation requests rejected because the slot was taken.
pub const SLOT_CONFLICTS_TOTAL: &str = "slotdesk_slot_conflicts_total";

/// Histogram: alternatives offered per rejected request.
pub const ALTERNATIVES_OFFERED: &str = "slotdesk_alternatives_offered";

/// Counter: contacts stored by CSV imports.
pub const CONTACTS_IMPORTED_TOTAL: &str = "slotdesk_contacts_imported_total";

/// Counter: rejected credentials. Labels: reason.
pub const AUTH_FAILURES_TOTAL: &str = "slotdesk_auth_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: requests currently being served.
pub const REQUESTS_IN_FLIGHT: &str = "slotdesk_requests_in_flight";

/// Counter: requests turned away at the concurrency limit.
pub const REQUESTS_REJECTED_TOTAL: &str = "slotdesk_requests_rejected_total";

/// Gauge: number of loaded account engines.
pub const TENANTS_ACTIVE: &str = "slotdesk_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotdesk_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotdesk_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if `port` is `None`.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
