//! Cross-component scenarios exercising more than one service at once —
//! the parts of the control plane's behavior that only show up when the
//! Registry, Distributor, Heartbeat Monitor, and Reporter interact.

use chrono::Utc;
use fleet_config::{ComplianceConfig, DistributorConfig, HeartbeatConfig, RegistryConfig};
use fleet_core::models::{
    AgentDistributionState, AgentIdentity, AgentStatus, ConnectionState, DistributionState,
    HealthStatus, Target,
};
use fleet_core::services::{AgentRegistry, ComplianceReporter, HeartbeatMonitor, PolicyDistributor};
use std::sync::Arc;
use uuid::Uuid;

fn identity(hostname: &str) -> AgentIdentity {
    AgentIdentity {
        id: Uuid::new_v4(),
        hostname: hostname.to_string(),
        os_version: "14.5".to_string(),
        app_version: "1.2.0".to_string(),
        hardware_model: "MacBookPro18,1".to_string(),
        serial_hash: Uuid::new_v4().to_string(),
        username: "alice".to_string(),
        registered_at: Utc::now(),
        tags: vec![],
    }
}

fn healthy_status(agent_id: Uuid) -> AgentStatus {
    AgentStatus {
        agent_id,
        connection_state: ConnectionState::Active,
        health_status: HealthStatus::Healthy,
        last_heartbeat: None,
        last_policy_sync: None,
        active_policy_count: 2,
        disk_total_bytes: 500_000_000_000,
        disk_used_bytes: 100_000_000_000,
        freed_bytes: 1_000_000,
        cleanup_count: 4,
        cpu_percent: 3.0,
        mem_percent: 20.0,
        captured_at: Utc::now(),
    }
}

/// Scenario 6 from the end-to-end suite: 4 of 5 targeted agents are active
/// and acknowledge, one is offline and fails at dispatch time. The
/// per-agent success-rate rule in the component algorithm (not all
/// succeeded, but rate meets the threshold) resolves to
/// `partially_completed`; a stricter threshold on the same split fails.
#[tokio::test]
async fn distribution_partial_success_then_stricter_threshold_fails() {
    let registry = Arc::new(AgentRegistry::new(RegistryConfig::default()));
    let mut agent_ids = Vec::new();
    for i in 0..5 {
        let registered = registry.register(identity(&format!("mac-{i}")), vec![]).unwrap();
        agent_ids.push(registered.id());
    }
    // Take the last agent offline before distributing.
    registry
        .update_connection_state(agent_ids[4], ConnectionState::Offline)
        .unwrap();

    let distributor = Arc::new(PolicyDistributor::new(
        DistributorConfig {
            max_concurrent_distributions: 10,
            acknowledgement_timeout_secs: 3600,
            minimum_success_rate: 80.0,
            max_retry_attempts: 3,
            history_capacity: 100,
        },
        registry.clone(),
    ));

    let status = distributor
        .distribute(
            "cache-cleanup",
            serde_json::json!({"level": "standard"}),
            Target::Agents(agent_ids.clone()),
            Uuid::new_v4(),
        )
        .unwrap();

    assert_eq!(
        status.agent_statuses[&agent_ids[4]].state,
        AgentDistributionState::Failed
    );

    for id in &agent_ids[0..4] {
        distributor.acknowledge(status.id, *id).unwrap();
    }

    let archived = distributor.find(status.id).unwrap();
    assert_eq!(archived.success_rate(), 80.0);
    assert_eq!(archived.state, DistributionState::PartiallyCompleted);

    // Rerun the same split with a 90% threshold: now it fails outright.
    for i in 0..4 {
        registry
            .update_connection_state(agent_ids[i], ConnectionState::Active)
            .unwrap();
    }
    let strict_distributor = Arc::new(PolicyDistributor::new(
        DistributorConfig {
            max_concurrent_distributions: 10,
            acknowledgement_timeout_secs: 3600,
            minimum_success_rate: 90.0,
            max_retry_attempts: 3,
            history_capacity: 100,
        },
        registry.clone(),
    ));
    let retry_status = strict_distributor
        .distribute(
            "cache-cleanup",
            serde_json::json!({"level": "standard"}),
            Target::Agents(agent_ids.clone()),
            Uuid::new_v4(),
        )
        .unwrap();
    for id in &agent_ids[0..4] {
        strict_distributor.acknowledge(retry_status.id, *id).unwrap();
    }
    let archived = strict_distributor.find(retry_status.id).unwrap();
    assert_eq!(archived.state, DistributionState::Failed);
}

/// An agent registers, reports a heartbeat, receives a policy, acknowledges
/// it, and its compliance score reflects the resulting live state — the
/// full read chain the Reporter depends on without owning any of it.
#[tokio::test]
async fn end_to_end_lifecycle_feeds_compliance_report() {
    let registry = Arc::new(AgentRegistry::new(RegistryConfig::default()));
    let registered = registry.register(identity("mac-01"), vec!["cleanup".to_string()]).unwrap();
    let agent_id = registered.id();

    let heartbeat_monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), registry.clone(), 100);
    let response = heartbeat_monitor
        .process_heartbeat(agent_id, healthy_status(agent_id))
        .unwrap();
    assert!(response.acknowledged);

    let distributor = Arc::new(PolicyDistributor::new(DistributorConfig::default(), registry.clone()));
    let distribution = distributor
        .distribute("cache-cleanup", serde_json::json!({}), Target::All, Uuid::new_v4())
        .unwrap();
    distributor.acknowledge(distribution.id, agent_id).unwrap();

    let reporter = ComplianceReporter::new(
        ComplianceConfig::default(),
        registry.clone(),
        distributor.clone(),
        HeartbeatConfig::default().offline_threshold_secs(),
    );
    let report = reporter.agent_report(agent_id).unwrap();
    assert_eq!(report.score.overall, 100.0);
    assert_eq!(report.connection_state, "active");

    let overview = reporter.fleet_overview();
    assert_eq!(overview.total_agents, 1);
    assert_eq!(overview.compliant_agents, 1);
    assert_eq!(overview.policy_deployment_counts.get("cache-cleanup"), Some(&1));
}
