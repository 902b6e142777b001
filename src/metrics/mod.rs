//! Prometheus metrics
//!
//! Exposed on the configured listen address when enabled:
//! - Field read counts by status
//! - Skipped field counts (unknown type tags)
//! - Poll cycle duration histogram by outcome
//! - Setpoint write counts

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid metrics listen address {}", config.listen))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| "Failed to install Prometheus recorder")?;

    info!("Prometheus metrics exposed on http://{}/metrics", addr);
    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "error"
    }
}

/// Record one field read
pub fn record_field_read(field: &str, ok: bool) {
    counter!(
        "ebox_field_reads_total",
        "field" => field.to_string(),
        "status" => status(ok)
    )
    .increment(1);
}

/// Record a field skipped because of its type tag
pub fn record_skipped_field(field: &str) {
    counter!("ebox_fields_skipped_total", "field" => field.to_string()).increment(1);
}

/// Record poll cycle timing
pub fn record_poll_cycle(ok: bool, duration: Duration) {
    histogram!("ebox_poll_cycle_seconds", "status" => status(ok)).record(duration.as_secs_f64());
}

pub fn record_setpoint_write(ok: bool) {
    counter!("ebox_setpoint_writes_total", "status" => status(ok)).increment(1);
}

pub fn record_sink_write(ok: bool) {
    counter!("ebox_sink_writes_total", "status" => status(ok)).increment(1);
}
