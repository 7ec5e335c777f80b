//! Wires up structured logging and, optionally, a Prometheus metrics
//! exporter for the fleet control plane's composition root.

pub mod config;

use config::TelemetryConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global `tracing` subscriber and, if configured, starts
/// the Prometheus exporter. Must be called exactly once, before any other
/// component logs or records a metric.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }

    if let Some(addr) = &config.metrics_listen_addr {
        let socket_addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid metrics_listen_addr {addr:?}: {e}"))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(socket_addr)
            .install()?;
    }

    Ok(())
}

/// Records a named counter increment. Thin wrapper kept so call sites don't
/// depend on the `metrics` crate's macros directly.
pub fn increment_counter(name: &'static str) {
    metrics::counter!(name, 1);
}

pub fn record_gauge(name: &'static str, value: f64) {
    metrics::gauge!(name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_disables_metrics_exporter() {
        let config = TelemetryConfig::default();
        assert!(config.metrics_listen_addr.is_none());
        assert_eq!(config.log_filter, "info");
    }
}
