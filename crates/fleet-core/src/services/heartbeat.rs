//! Heartbeat Monitor (component F): liveness state machine and the
//! background offline-detection loop.
//!
//! The "delegate" pattern the original platform uses for health-change
//! notification is expressed here as an explicit [`HeartbeatObserver`]
//! trait the host registers, rather than a process-wide mutable listener
//! list — the crate's design notes call this out directly.

use crate::error::{FleetError, FleetResult};
use crate::models::{AgentStatus, ConnectionState, HealthStatus};
use crate::services::registry::AgentRegistry;
use chrono::{DateTime, Duration, Utc};
use fleet_config::HeartbeatConfig;
use fleet_protocol::HeartbeatResponse;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub trait HeartbeatObserver: Send + Sync {
    fn on_health_changed(&self, _agent_id: Uuid, _from: HealthStatus, _to: HealthStatus) {}
    fn on_heartbeat_received(&self, _agent_id: Uuid) {}
    fn on_agent_came_online(&self, _agent_id: Uuid) {}
    fn on_agent_went_offline(&self, _agent_id: Uuid) {}
}

pub struct NoopObserver;
impl HeartbeatObserver for NoopObserver {}

struct MonitorState {
    heartbeat_history: HashMap<Uuid, VecDeque<DateTime<Utc>>>,
    previous_health: HashMap<Uuid, HealthStatus>,
}

impl MonitorState {
    fn forget(&mut self, id: Uuid) {
        self.heartbeat_history.remove(&id);
        self.previous_health.remove(&id);
    }
}

pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    registry: Arc<AgentRegistry>,
    observer: Arc<dyn HeartbeatObserver>,
    state: RwLock<MonitorState>,
    history_capacity: usize,
}

impl HeartbeatMonitor {
    pub fn new(config: HeartbeatConfig, registry: Arc<AgentRegistry>, history_capacity: usize) -> Self {
        Self::with_observer(config, registry, history_capacity, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        config: HeartbeatConfig,
        registry: Arc<AgentRegistry>,
        history_capacity: usize,
        observer: Arc<dyn HeartbeatObserver>,
    ) -> Self {
        Self {
            config,
            registry,
            observer,
            state: RwLock::new(MonitorState {
                heartbeat_history: HashMap::new(),
                previous_health: HashMap::new(),
            }),
            history_capacity,
        }
    }

    fn offline_threshold(&self) -> Duration {
        Duration::seconds(self.config.offline_threshold_secs() as i64)
    }

    /// `processHeartbeat` steps 1-8.
    pub fn process_heartbeat(&self, id: Uuid, status: AgentStatus) -> FleetResult<HeartbeatResponse> {
        let agent = self
            .registry
            .lookup_by_id(id)
            .ok_or(FleetError::AgentNotFound { id })?;

        let previous_connection_state = agent.connection_state;
        let previous_health = {
            let state = self.state.read();
            state
                .previous_health
                .get(&id)
                .copied()
                .or_else(|| agent.latest_status.as_ref().map(|s| s.health_status))
        };
        let new_health = status.health_status;

        self.registry.update_status(id, status)?;

        {
            let mut state = self.state.write();
            let history = state.heartbeat_history.entry(id).or_default();
            history.push_back(Utc::now());
            while history.len() > self.history_capacity {
                history.pop_front();
            }
            state.previous_health.insert(id, new_health);
        }

        if let Some(previous) = previous_health {
            if previous != new_health {
                self.observer.on_health_changed(id, previous, new_health);
            }
        }

        self.observer.on_heartbeat_received(id);

        if previous_connection_state == ConnectionState::Offline {
            self.observer.on_agent_came_online(id);
        }

        Ok(HeartbeatResponse {
            acknowledged: true,
            server_time: Utc::now(),
            pending_policies: Vec::new(),
            pending_commands: Vec::new(),
            next_heartbeat: self.config.expected_interval_secs,
        })
    }

    /// One iteration of the background loop: mark overdue active agents
    /// offline, then optionally sweep agents stale past `staleTimeout`.
    pub fn run_check(&self) {
        let now = Utc::now();
        let offline_threshold = self.offline_threshold();
        let active_agents = self.registry.agents_by_state(ConnectionState::Active);

        for agent in active_agents {
            if let Some(last_heartbeat) = agent.last_heartbeat {
                if now - last_heartbeat > offline_threshold {
                    if self
                        .registry
                        .update_connection_state(agent.id(), ConnectionState::Offline)
                        .is_ok()
                    {
                        self.observer.on_agent_went_offline(agent.id());
                        tracing::info!(agent_id = %agent.id(), "agentWentOffline");
                    }
                }
            }
        }

        if self.config.auto_remove_stale {
            let removed = self
                .registry
                .remove_stale_agents(Duration::seconds(self.config.stale_timeout_secs as i64));
            if !removed.is_empty() {
                let mut state = self.state.write();
                for id in removed {
                    state.forget(id);
                }
            }
        }
    }

    /// Agents whose elapsed time since last heartbeat is past the "missed
    /// one beat" mark but hasn't yet crossed the offline threshold.
    pub fn agents_at_risk(&self) -> Vec<Uuid> {
        let now = Utc::now();
        let lower_bound =
            Duration::seconds((self.config.expected_interval_secs * (self.config.missed_threshold as u64 - 1)) as i64);
        let upper_bound = self.offline_threshold();

        self.registry
            .agents_by_state(ConnectionState::Active)
            .into_iter()
            .filter_map(|agent| {
                let last_heartbeat = agent.last_heartbeat?;
                let elapsed = now - last_heartbeat;
                (elapsed > lower_bound && elapsed < upper_bound).then(|| agent.id())
            })
            .collect()
    }

    /// Spawns the cancellable background loop. The returned token's
    /// `cancel()` is idempotent; the loop observes it at the next
    /// `interval.tick()` and exits promptly.
    pub fn start_monitoring(self: Arc<Self>) -> (tokio::task::JoinHandle<()>, CancellationToken) {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let monitor = self;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                monitor.config.check_interval_secs,
            ));
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => {
                        tracing::debug!("heartbeat monitor loop cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        monitor.run_check();
                    }
                }
            }
        });
        (handle, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentIdentity;
    use fleet_config::RegistryConfig;

    fn monitor(expected_interval: u64, missed_threshold: u32) -> (Arc<AgentRegistry>, HeartbeatMonitor) {
        let registry = Arc::new(AgentRegistry::new(RegistryConfig::default()));
        let monitor = HeartbeatMonitor::new(
            HeartbeatConfig {
                expected_interval_secs: expected_interval,
                missed_threshold,
                check_interval_secs: 1,
                auto_remove_stale: false,
                stale_timeout_secs: 86_400,
            },
            registry.clone(),
            100,
        );
        (registry, monitor)
    }

    fn status(id: Uuid, health: HealthStatus) -> AgentStatus {
        AgentStatus {
            agent_id: id,
            connection_state: ConnectionState::Active,
            health_status: health,
            last_heartbeat: None,
            last_policy_sync: None,
            active_policy_count: 0,
            disk_total_bytes: 0,
            disk_used_bytes: 0,
            freed_bytes: 0,
            cleanup_count: 0,
            cpu_percent: 0.0,
            mem_percent: 0.0,
            captured_at: Utc::now(),
        }
    }

    fn register(registry: &AgentRegistry) -> Uuid {
        let identity = AgentIdentity {
            id: Uuid::new_v4(),
            hostname: "mac-01".to_string(),
            os_version: "14.5".to_string(),
            app_version: "1.2.0".to_string(),
            hardware_model: "MacBookPro18,1".to_string(),
            serial_hash: "abc".to_string(),
            username: "alice".to_string(),
            registered_at: Utc::now(),
            tags: vec![],
        };
        let id = identity.id;
        registry.register(identity, vec![]).unwrap();
        id
    }

    #[test]
    fn process_heartbeat_fails_for_unknown_agent() {
        let (_registry, monitor) = monitor(30, 3);
        let err = monitor
            .process_heartbeat(Uuid::new_v4(), status(Uuid::new_v4(), HealthStatus::Healthy))
            .unwrap_err();
        assert_eq!(err, FleetError::AgentNotFound { id: err_id(&err) });
    }

    fn err_id(err: &FleetError) -> Uuid {
        match err {
            FleetError::AgentNotFound { id } => *id,
            _ => panic!("expected AgentNotFound"),
        }
    }

    #[test]
    fn process_heartbeat_acknowledges_and_stamps_next_interval() {
        let (registry, monitor) = monitor(45, 3);
        let id = register(&registry);
        let response = monitor.process_heartbeat(id, status(id, HealthStatus::Healthy)).unwrap();
        assert!(response.acknowledged);
        assert_eq!(response.next_heartbeat, 45);
    }

    #[tokio::test]
    async fn offline_detection_and_recovery_emit_once() {
        let (registry, monitor) = monitor(1, 3);
        let id = register(&registry);
        monitor.process_heartbeat(id, status(id, HealthStatus::Healthy)).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(4000)).await;
        monitor.run_check();
        let agent = registry.lookup_by_id(id).unwrap();
        assert_eq!(agent.connection_state, ConnectionState::Offline);

        monitor.process_heartbeat(id, status(id, HealthStatus::Healthy)).unwrap();
        let agent = registry.lookup_by_id(id).unwrap();
        assert_eq!(agent.connection_state, ConnectionState::Active);
    }
}
