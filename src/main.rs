//! Composition root for the fleet control plane core.
//!
//! This binary wires every component together and starts the background
//! heartbeat monitor. It has no HTTP transport of its own: the core
//! consumes parsed requests and produces responses, and binding a protocol
//! in front of it is left to whatever embeds this crate.

use fleet_config::{ConfigLoader, FleetConfig};
use fleet_core::models::InMemoryUserStore;
use fleet_core::services::{
    AccessController, AgentRegistry, ApprovalPolicy, ComplianceReporter, HeartbeatMonitor,
    PolicyDistributor, RegistrationService,
};
use fleet_crypto::{JwtProvider, JwtProviderConfig};
use fleet_telemetry::config::TelemetryConfig;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();

    fleet_telemetry::init_telemetry(&TelemetryConfig {
        log_filter: config.logging.level.clone(),
        json_logs: config.logging.format == "json",
        metrics_listen_addr: std::env::var("FLEET_METRICS_ADDR").ok(),
    })?;

    info!("starting fleet control plane core");

    let registry = Arc::new(AgentRegistry::new(config.registry.clone()));

    let jwt_provider = Arc::new(JwtProvider::new(JwtProviderConfig {
        secret: config.jwt.secret.expose_secret().clone().into_bytes(),
        issuer: config.jwt.issuer.clone(),
        audience: config.jwt.audience.clone(),
        access_ttl_seconds: config.jwt.access_ttl_seconds,
        refresh_ttl_seconds: config.jwt.refresh_ttl_seconds,
        max_revoked_tokens: config.jwt.max_revoked_tokens,
    }));
    let user_store = Arc::new(InMemoryUserStore::new());

    let access_controller = Arc::new(AccessController::new(
        config.access_control.clone(),
        jwt_provider.clone(),
        user_store,
    ));

    let registration_service = Arc::new(RegistrationService::new(
        config.registration.clone(),
        ApprovalPolicy::AutoApprove,
        registry.clone(),
        env!("CARGO_PKG_VERSION"),
        config.heartbeat.expected_interval_secs,
    ));

    let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
        config.heartbeat.clone(),
        registry.clone(),
        config.registry.heartbeat_history_capacity,
    ));
    let (monitor_handle, monitor_cancellation) = heartbeat_monitor.clone().start_monitoring();

    let distributor = Arc::new(PolicyDistributor::new(
        config.distributor.clone(),
        registry.clone(),
    ));

    let reporter = Arc::new(ComplianceReporter::new(
        config.compliance.clone(),
        registry.clone(),
        distributor.clone(),
        config.heartbeat.offline_threshold_secs(),
    ));

    info!(
        max_agents = config.registry.max_agents,
        "fleet control plane ready"
    );

    // Held here by whatever would otherwise be an RPC or HTTP layer binding
    // a protocol in front of this core. This binary only keeps them alive
    // and exits cleanly on shutdown.
    let _ = (
        access_controller,
        registration_service,
        distributor,
        reporter,
    );

    shutdown_signal().await;
    monitor_cancellation.cancel();
    let _ = monitor_handle.await;
    info!("fleet control plane core shutting down");
    Ok(())
}

fn load_config() -> FleetConfig {
    let environment = std::env::var("FLEET_ENV").unwrap_or_else(|_| "development".to_string());
    ConfigLoader::new("config", environment)
        .load()
        .unwrap_or_else(|err| {
            eprintln!("falling back to default configuration: {err}");
            FleetConfig::default()
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
