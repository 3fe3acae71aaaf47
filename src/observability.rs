use std::net::SocketAddr;

use crate::model::ReservationStatus;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations created. Labels: status (pending/accepted).
pub const RESERVATIONS_CREATED_TOTAL: &str = "reserva_reservations_created_total";

/// Counter: booking attempts rejected with a conflict.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "reserva_reservation_conflicts_total";

/// Counter: status transitions applied. Labels: status.
pub const RESERVATION_TRANSITIONS_TOTAL: &str = "reserva_reservation_transitions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms currently open for booking.
pub const ROOMS_ACTIVE: &str = "reserva_rooms_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "reserva_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "reserva_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Initialise a default `tracing` subscriber. Safe to call more than once
/// (later calls are no-ops), which keeps it usable from tests.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Map a status to a short label for metrics.
pub fn status_label(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Pending => "pending",
        ReservationStatus::Accepted => "accepted",
        ReservationStatus::Declined => "declined",
        ReservationStatus::Cancelled => "cancelled",
    }
}
