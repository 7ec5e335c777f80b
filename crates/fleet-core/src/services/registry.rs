//! Agent Registry (component C): the single authoritative map of agents.
//!
//! Internally serialized behind one `parking_lot::RwLock` over the whole
//! index set so `register`/`unregister`/status updates stay atomic with
//! respect to the secondary indices, the way the teacher keeps a service's
//! mutable state behind a single guarded struct rather than per-field locks.

use crate::error::{FleetError, FleetResult};
use crate::models::{AgentIdentity, AgentStatus, ConnectionState, RegisteredAgent};
use chrono::{DateTime, Duration, Utc};
use fleet_config::RegistryConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RegistryStatistics {
    pub total_agents: usize,
    pub active_agents: usize,
    pub offline_agents: usize,
    pub pending_agents: usize,
}

#[derive(Default)]
struct RegistryState {
    agents: HashMap<Uuid, RegisteredAgent>,
    token_index: HashMap<String, Uuid>,
}

pub struct AgentRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
}

impl AgentRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// I1: rejects at `maxAgents` unless the identity is already registered
    /// and reregistration is allowed, in which case the record is replaced
    /// atomically with a fresh token and reset connection state.
    pub fn register(
        &self,
        mut identity: AgentIdentity,
        capabilities: Vec<String>,
    ) -> FleetResult<RegisteredAgent> {
        let mut state = self.state.write();
        let now = Utc::now();

        if let Some(existing) = state.agents.get(&identity.id) {
            if !self.config.allow_reregistration {
                return Err(FleetError::AgentAlreadyRegistered { id: identity.id });
            }
            identity.registered_at = existing.identity.registered_at;
        } else if state.agents.len() >= self.config.max_agents {
            return Err(FleetError::MaxAgentsReached);
        }

        if let Some(old_token) = state.agents.get(&identity.id).map(|old| old.auth_token.clone()) {
            state.token_index.remove(&old_token);
        }

        let token = fleet_crypto::generate_fingerprint();
        let registered = RegisteredAgent {
            identity: identity.clone(),
            auth_token: token.clone(),
            token_expires_at: now + Duration::days(365),
            capabilities,
            connection_state: ConnectionState::Active,
            latest_status: None,
            last_heartbeat: Some(now),
            registered_at: identity.registered_at,
        };

        state.token_index.insert(token, identity.id);
        state.agents.insert(identity.id, registered.clone());
        tracing::info!(agent_id = %identity.id, hostname = %registered.identity.hostname, "agent registered");

        Ok(registered)
    }

    pub fn unregister(&self, id: Uuid) -> FleetResult<()> {
        let mut state = self.state.write();
        let agent = state
            .agents
            .remove(&id)
            .ok_or(FleetError::AgentNotFound { id })?;
        state.token_index.remove(&agent.auth_token);
        tracing::info!(agent_id = %id, "agent unregistered");
        Ok(())
    }

    pub fn lookup_by_id(&self, id: Uuid) -> Option<RegisteredAgent> {
        self.state.read().agents.get(&id).cloned()
    }

    pub fn lookup_by_token(&self, token: &str) -> Option<RegisteredAgent> {
        let state = self.state.read();
        let id = state.token_index.get(token)?;
        state.agents.get(id).cloned()
    }

    pub fn agents_by_tag(&self, tag: &str) -> Vec<RegisteredAgent> {
        self.state
            .read()
            .agents
            .values()
            .filter(|a| a.has_tag(tag))
            .cloned()
            .collect()
    }

    pub fn agents_by_capability(&self, capability: &str) -> Vec<RegisteredAgent> {
        self.state
            .read()
            .agents
            .values()
            .filter(|a| a.has_capability(capability))
            .cloned()
            .collect()
    }

    pub fn agents_by_state(&self, state: ConnectionState) -> Vec<RegisteredAgent> {
        self.state
            .read()
            .agents
            .values()
            .filter(|a| a.connection_state == state)
            .cloned()
            .collect()
    }

    pub fn all_agents(&self) -> Vec<RegisteredAgent> {
        self.state.read().agents.values().cloned().collect()
    }

    /// I2: atomically sets `latestStatus`, stamps `lastHeartbeat`, and
    /// forces `connectionState = active`.
    pub fn update_status(&self, id: Uuid, status: AgentStatus) -> FleetResult<()> {
        let mut state = self.state.write();
        let agent = state
            .agents
            .get_mut(&id)
            .ok_or(FleetError::AgentNotFound { id })?;
        let now = Utc::now();
        agent.latest_status = Some(status);
        agent.last_heartbeat = Some(now);
        agent.connection_state = ConnectionState::Active;
        Ok(())
    }

    pub fn update_connection_state(&self, id: Uuid, new_state: ConnectionState) -> FleetResult<()> {
        let mut state = self.state.write();
        let agent = state
            .agents
            .get_mut(&id)
            .ok_or(FleetError::AgentNotFound { id })?;
        agent.connection_state = new_state;
        Ok(())
    }

    pub fn validate_token(&self, token: &str) -> FleetResult<Uuid> {
        self.state
            .read()
            .token_index
            .get(token)
            .copied()
            .ok_or(FleetError::InvalidToken)
    }

    pub fn refresh_token(&self, id: Uuid) -> FleetResult<String> {
        let mut state = self.state.write();
        let agent = state
            .agents
            .get(&id)
            .ok_or(FleetError::AgentNotFound { id })?
            .clone();
        let new_token = fleet_crypto::generate_fingerprint();
        state.token_index.remove(&agent.auth_token);
        state.token_index.insert(new_token.clone(), id);
        let agent_mut = state.agents.get_mut(&id).expect("checked above");
        agent_mut.auth_token = new_token.clone();
        agent_mut.token_expires_at = Utc::now() + Duration::days(365);
        Ok(new_token)
    }

    /// I4: removes every agent with no heartbeat whose registration is
    /// older than `timeout`, or whose last heartbeat is older than
    /// `now - timeout`. Returns the removed ids.
    pub fn remove_stale_agents(&self, timeout: Duration) -> Vec<Uuid> {
        let now = Utc::now();
        let mut state = self.state.write();
        let stale_ids: Vec<Uuid> = state
            .agents
            .values()
            .filter(|a| is_stale(a, now, timeout))
            .map(|a| a.id())
            .collect();

        for id in &stale_ids {
            if let Some(agent) = state.agents.remove(id) {
                state.token_index.remove(&agent.auth_token);
            }
        }
        if !stale_ids.is_empty() {
            tracing::info!(count = stale_ids.len(), "removed stale agents");
        }
        stale_ids
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let state = self.state.read();
        let mut stats = RegistryStatistics {
            total_agents: state.agents.len(),
            ..Default::default()
        };
        for agent in state.agents.values() {
            match agent.connection_state {
                ConnectionState::Active => stats.active_agents += 1,
                ConnectionState::Offline => stats.offline_agents += 1,
                ConnectionState::Pending => stats.pending_agents += 1,
                _ => {}
            }
        }
        stats
    }
}

fn is_stale(agent: &RegisteredAgent, now: DateTime<Utc>, timeout: Duration) -> bool {
    match agent.last_heartbeat {
        None => now - agent.registered_at > timeout,
        Some(last) => now - last > timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> AgentIdentity {
        AgentIdentity {
            id: Uuid::new_v4(),
            hostname: "mac-01".to_string(),
            os_version: "14.5".to_string(),
            app_version: "1.2.0".to_string(),
            hardware_model: "MacBookPro18,1".to_string(),
            serial_hash: "abc123".to_string(),
            username: "alice".to_string(),
            registered_at: Utc::now(),
            tags: vec!["prod".to_string()],
        }
    }

    fn registry(max_agents: usize, allow_reregistration: bool) -> AgentRegistry {
        AgentRegistry::new(RegistryConfig {
            max_agents,
            allow_reregistration,
            heartbeat_history_capacity: 100,
        })
    }

    #[test]
    fn register_then_lookup_by_id_round_trips() {
        let registry = registry(10, true);
        let identity = sample_identity();
        let registered = registry.register(identity.clone(), vec!["cleanup".into()]).unwrap();
        assert_eq!(registry.lookup_by_id(identity.id), Some(registered));
    }

    #[test]
    fn register_rejects_past_max_agents() {
        let registry = registry(1, true);
        registry.register(sample_identity(), vec![]).unwrap();
        let err = registry.register(sample_identity(), vec![]).unwrap_err();
        assert_eq!(err, FleetError::MaxAgentsReached);
    }

    #[test]
    fn reregistration_replaces_record_with_fresh_token() {
        let registry = registry(1, true);
        let identity = sample_identity();
        let first = registry.register(identity.clone(), vec![]).unwrap();
        let second = registry.register(identity.clone(), vec![]).unwrap();
        assert_eq!(first.identity.id, second.identity.id);
        assert_ne!(first.auth_token, second.auth_token);
        assert!(registry.lookup_by_token(&first.auth_token).is_none());
    }

    #[test]
    fn reregistration_rejected_when_disallowed() {
        let registry = registry(10, false);
        let identity = sample_identity();
        registry.register(identity.clone(), vec![]).unwrap();
        let err = registry.register(identity.clone(), vec![]).unwrap_err();
        assert_eq!(err, FleetError::AgentAlreadyRegistered { id: identity.id });
    }

    #[test]
    fn update_status_fails_for_unknown_agent() {
        let registry = registry(10, true);
        let status = crate::models::AgentStatus {
            agent_id: Uuid::new_v4(),
            connection_state: ConnectionState::Active,
            health_status: crate::models::HealthStatus::Healthy,
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
        };
        assert!(registry.update_status(Uuid::new_v4(), status).is_err());
    }

    #[test]
    fn remove_stale_agents_removes_agents_without_recent_heartbeat() {
        let registry = registry(10, true);
        let identity = sample_identity();
        let registered = registry.register(identity, vec![]).unwrap();
        let removed = registry.remove_stale_agents(Duration::seconds(0));
        assert_eq!(removed, vec![registered.id()]);
        assert!(registry.lookup_by_id(registered.id()).is_none());
    }

    #[test]
    fn validate_token_resolves_to_agent_id() {
        let registry = registry(10, true);
        let identity = sample_identity();
        let registered = registry.register(identity.clone(), vec![]).unwrap();
        assert_eq!(registry.validate_token(&registered.auth_token).unwrap(), identity.id);
    }
}
