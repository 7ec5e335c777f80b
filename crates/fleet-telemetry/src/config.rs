//! Knobs for [`crate::init_telemetry`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `tracing-subscriber` `EnvFilter` directive, e.g. `"info"` or
    /// `"fleet_core=debug,info"`.
    pub log_filter: String,
    /// Emit logs as single-line JSON instead of the default human-readable
    /// format. Production deployments want this; local development doesn't.
    pub json_logs: bool,
    /// Address the Prometheus metrics exporter listens on, e.g.
    /// `"0.0.0.0:9000"`. `None` disables the exporter entirely.
    pub metrics_listen_addr: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            json_logs: false,
            metrics_listen_addr: None,
        }
    }
}
