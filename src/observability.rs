use std::net::SocketAddr;

use crate::config::Config;

// ── RED metrics (operation-driven) ──────────────────────────────

/// Counter: engine operations executed. Labels: op, status.
pub const OPERATIONS_TOTAL: &str = "tempalias_operations_total";

/// Histogram: engine operation latency in seconds. Labels: op.
pub const OPERATION_DURATION_SECONDS: &str = "tempalias_operation_duration_seconds";

/// Counter: candidates rejected for overlapping a same-key interval.
pub const OVERLAP_CONFLICTS_TOTAL: &str = "tempalias_overlap_conflicts_total";

/// Counter: splits whose close step had to be undone.
pub const SPLIT_ROLLBACKS_TOTAL: &str = "tempalias_split_rollbacks_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "tempalias_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "tempalias_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "tempalias_wal_compactions_total";

/// Install the fmt tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init_metrics(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Logging plus, when `config.metrics_port` is set, the Prometheus endpoint.
pub fn init(config: &Config) -> Result<(), metrics_exporter_prometheus::BuildError> {
    init_tracing();
    init_metrics(config.metrics_port)
}

/// Record one finished engine operation.
pub(crate) fn record_operation(op: &'static str, ok: bool, started: std::time::Instant) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(OPERATIONS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_without_metrics_port() {
        let config = Config::default();
        assert!(init(&config).is_ok());
        // Second install is tolerated.
        init_tracing();
    }

    #[test]
    fn record_operation_without_recorder() {
        record_operation("insert", true, std::time::Instant::now());
        record_operation("insert", false, std::time::Instant::now());
    }
}
