//! Policy Distributor (component G): target resolution, chunked rollout,
//! acknowledgement, retry, and rollback.
//!
//! The distributor never blocks on actual agent delivery — that's the
//! transport layer's job. `distribute()` transitions per-agent entries to
//! `in_progress` and returns immediately; a background task closes out any
//! entry still `in_progress` once `acknowledgementTimeout` elapses.

use crate::audit::AuditRingBuffer;
use crate::error::{FleetError, FleetResult};
use crate::models::{
    AgentDistributionState, AgentDistributionStatus, ConnectionState, DistributionState,
    DistributionStatus, Target, TargetFilter,
};
use crate::services::registry::AgentRegistry;
use chrono::Utc;
use fleet_config::DistributorConfig;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub struct PolicyDistributor {
    config: DistributorConfig,
    registry: Arc<AgentRegistry>,
    policy_versions: RwLock<HashMap<String, u64>>,
    active: RwLock<HashMap<Uuid, DistributionStatus>>,
    history: RwLock<AuditRingBuffer<DistributionStatus>>,
}

impl PolicyDistributor {
    pub fn new(config: DistributorConfig, registry: Arc<AgentRegistry>) -> Self {
        let history_capacity = config.history_capacity;
        Self {
            config,
            registry,
            policy_versions: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(AuditRingBuffer::new(history_capacity)),
        }
    }

    fn next_policy_version(&self, policy_name: &str) -> u64 {
        let mut versions = self.policy_versions.write();
        let version = versions.entry(policy_name.to_string()).or_insert(0);
        *version += 1;
        *version
    }

    fn resolve_target(&self, target: &Target) -> Vec<Uuid> {
        match target {
            Target::All => self.registry.all_agents().iter().map(|a| a.id()).collect(),
            Target::Agents(ids) => ids
                .iter()
                .filter(|id| self.registry.lookup_by_id(**id).is_some())
                .copied()
                .collect(),
            Target::Tags(tags) => {
                let mut seen = HashSet::new();
                let mut result = Vec::new();
                for tag in tags {
                    for agent in self.registry.agents_by_tag(tag) {
                        if seen.insert(agent.id()) {
                            result.push(agent.id());
                        }
                    }
                }
                result
            }
            Target::Capabilities(capabilities) => {
                let mut seen = HashSet::new();
                let mut result = Vec::new();
                for capability in capabilities {
                    for agent in self.registry.agents_by_capability(capability) {
                        if seen.insert(agent.id()) {
                            result.push(agent.id());
                        }
                    }
                }
                result
            }
            Target::Filter(filter) => self.apply_filter(filter),
            Target::Combined(targets) => {
                let mut seen = HashSet::new();
                let mut result = Vec::new();
                for sub in targets {
                    for id in self.resolve_target(sub) {
                        if seen.insert(id) {
                            result.push(id);
                        }
                    }
                }
                result
            }
        }
    }

    fn apply_filter(&self, filter: &TargetFilter) -> Vec<Uuid> {
        let mut agents = self.registry.all_agents();

        if let Some(state) = filter.connection_state {
            agents.retain(|a| a.connection_state == state);
        }
        if !filter.required_tags.is_empty() {
            agents.retain(|a| filter.required_tags.iter().all(|t| a.has_tag(t)));
        }
        if !filter.required_capabilities.is_empty() {
            agents.retain(|a| filter.required_capabilities.iter().all(|c| a.has_capability(c)));
        }
        if !filter.exclude_ids.is_empty() {
            agents.retain(|a| !filter.exclude_ids.contains(&a.id()));
        }
        if let Some(after) = filter.registered_after {
            agents.retain(|a| a.registered_at > after);
        }

        let mut ids: Vec<Uuid> = agents.into_iter().map(|a| a.id()).collect();
        if let Some(max_count) = filter.max_count {
            ids.truncate(max_count);
        }
        ids
    }

    /// Marks each of `agent_ids` in-progress if its agent is active,
    /// otherwise failed. Chunked only in the sense that each chunk would be
    /// dispatched as a parallel batch by a real transport; there is no
    /// actual network call here to parallelize.
    fn dispatch(&self, status: &mut DistributionStatus, agent_ids: &[Uuid]) {
        let chunk_size = self.config.max_concurrent_distributions.max(1);
        for chunk in agent_ids.chunks(chunk_size) {
            for id in chunk {
                let Some(entry) = status.agent_statuses.get_mut(id) else {
                    continue;
                };
                match self.registry.lookup_by_id(*id) {
                    Some(agent) if agent.connection_state == ConnectionState::Active => {
                        entry.state = AgentDistributionState::InProgress;
                        entry.started_at = Some(Utc::now());
                    }
                    _ => {
                        entry.state = AgentDistributionState::Failed;
                        entry.error_message = Some("agent not active".to_string());
                        entry.completed_at = Some(Utc::now());
                    }
                }
            }
        }
    }

    fn finalize_locked(&self, status: &mut DistributionStatus) {
        if status.has_pending_or_in_progress() {
            return;
        }
        let total = status.total_agents();
        let successful = status.successful_agents();
        let rate = status.success_rate();
        status.state = if total > 0 && successful == total {
            DistributionState::Completed
        } else if rate >= self.config.minimum_success_rate {
            DistributionState::PartiallyCompleted
        } else {
            DistributionState::Failed
        };
        status.completed_at = Some(Utc::now());
    }

    fn archive(&self, status: DistributionStatus) {
        tracing::info!(distribution_id = %status.id, state = ?status.state, "distribution archived");
        self.history.write().push(status);
    }

    fn schedule_timeout(self: &Arc<Self>, distribution_id: Uuid) {
        let distributor = Arc::clone(self);
        let timeout = std::time::Duration::from_secs(self.config.acknowledgement_timeout_secs);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            distributor.finalize_timeouts(distribution_id);
        });
    }

    fn finalize_timeouts(&self, distribution_id: Uuid) {
        let mut active = self.active.write();
        let Some(status) = active.get_mut(&distribution_id) else {
            return;
        };
        let now = Utc::now();
        for entry in status.agent_statuses.values_mut() {
            if entry.state == AgentDistributionState::InProgress {
                entry.state = AgentDistributionState::Failed;
                entry.error_message = Some("Acknowledgement timeout".to_string());
                entry.completed_at = Some(now);
            }
        }
        self.finalize_locked(status);
        if !status.has_pending_or_in_progress() {
            if let Some(finished) = active.remove(&distribution_id) {
                drop(active);
                self.archive(finished);
            }
        }
    }

    pub fn distribute(
        self: &Arc<Self>,
        policy_name: impl Into<String>,
        policy_payload: serde_json::Value,
        target: Target,
        initiated_by: Uuid,
    ) -> FleetResult<DistributionStatus> {
        let policy_name = policy_name.into();
        let version = self.next_policy_version(&policy_name);

        let agent_ids = self.resolve_target(&target);
        if agent_ids.is_empty() {
            return Err(FleetError::NoTargetAgents);
        }

        let now = Utc::now();
        let agent_statuses = agent_ids
            .iter()
            .map(|id| (*id, AgentDistributionStatus::pending(*id, version)))
            .collect();

        let mut status = DistributionStatus {
            id: Uuid::new_v4(),
            policy_name,
            policy_version: version,
            target,
            state: DistributionState::InProgress,
            agent_statuses,
            initiated_at: now,
            started_at: Some(now),
            completed_at: None,
            initiated_by,
            message: None,
            policy_payload,
        };

        self.dispatch(&mut status, &agent_ids);
        let distribution_id = status.id;
        self.active.write().insert(distribution_id, status.clone());
        self.schedule_timeout(distribution_id);

        Ok(status)
    }

    pub fn acknowledge(&self, distribution_id: Uuid, agent_id: Uuid) -> FleetResult<()> {
        let mut active = self.active.write();
        let status = active
            .get_mut(&distribution_id)
            .ok_or(FleetError::DistributionNotFound { id: distribution_id })?;
        let entry = status
            .agent_statuses
            .get_mut(&agent_id)
            .ok_or(FleetError::AgentNotFound { id: agent_id })?;

        let now = Utc::now();
        entry.acknowledged = true;
        entry.acknowledged_at = Some(now);
        entry.state = AgentDistributionState::Completed;
        entry.completed_at = Some(now);

        self.finalize_locked(status);
        if !status.has_pending_or_in_progress() {
            if let Some(finished) = active.remove(&distribution_id) {
                drop(active);
                self.archive(finished);
            }
        }
        Ok(())
    }

    /// No-op if the distribution is already cancelled (idempotent).
    pub fn cancel(&self, distribution_id: Uuid) -> FleetResult<()> {
        let mut active = self.active.write();
        if let Some(status) = active.get_mut(&distribution_id) {
            if matches!(status.state, DistributionState::Pending | DistributionState::InProgress) {
                let now = Utc::now();
                for entry in status.agent_statuses.values_mut() {
                    if matches!(
                        entry.state,
                        AgentDistributionState::Pending | AgentDistributionState::InProgress
                    ) {
                        entry.state = AgentDistributionState::Cancelled;
                        entry.completed_at = Some(now);
                    }
                }
                status.state = DistributionState::Cancelled;
                status.completed_at = Some(now);
                if let Some(finished) = active.remove(&distribution_id) {
                    drop(active);
                    self.archive(finished);
                }
            }
            return Ok(());
        }
        drop(active);

        if self.history.read().iter().any(|d| d.id == distribution_id) {
            Ok(())
        } else {
            Err(FleetError::DistributionNotFound { id: distribution_id })
        }
    }

    /// Only valid from `completed` or `partially_completed`. The rollback
    /// effect itself is delegated to the transport layer; this records the
    /// state-machine transition only.
    pub fn rollback(&self, distribution_id: Uuid) -> FleetResult<()> {
        let mut history = self.history.write();
        let entry = history
            .iter_mut()
            .find(|d| d.id == distribution_id)
            .ok_or(FleetError::DistributionNotFound { id: distribution_id })?;

        if !matches!(
            entry.state,
            DistributionState::Completed | DistributionState::PartiallyCompleted
        ) {
            return Err(FleetError::InvalidTarget {
                reason: "rollback requires a completed or partially completed distribution".to_string(),
            });
        }

        entry.state = DistributionState::RolledBack;
        entry.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Moves every `failed` per-agent entry back to `pending`, bumps its
    /// retry count, and re-dispatches. Returns `maxRetriesExceeded` for the
    /// first agent whose retry count would exceed `maxRetryAttempts`,
    /// leaving the distribution untouched in history.
    pub fn retry_failed(self: &Arc<Self>, distribution_id: Uuid) -> FleetResult<DistributionStatus> {
        let mut status = self
            .history
            .write()
            .remove_by(|d| d.id == distribution_id)
            .ok_or(FleetError::DistributionNotFound { id: distribution_id })?;

        let failed_ids: Vec<Uuid> = status
            .agent_statuses
            .iter()
            .filter(|(_, s)| s.state == AgentDistributionState::Failed)
            .map(|(id, _)| *id)
            .collect();

        for id in &failed_ids {
            let entry = status.agent_statuses.get_mut(id).expect("present by construction");
            if entry.retry_count + 1 > self.config.max_retry_attempts {
                let failing_id = *id;
                self.archive(status);
                return Err(FleetError::MaxRetriesExceeded { id: failing_id });
            }
            entry.retry_count += 1;
            entry.state = AgentDistributionState::Pending;
            entry.error_message = None;
            entry.completed_at = None;
            entry.acknowledged = false;
            entry.acknowledged_at = None;
        }

        status.state = DistributionState::InProgress;
        status.completed_at = None;
        self.dispatch(&mut status, &failed_ids);

        let result = status.clone();
        self.active.write().insert(distribution_id, status);
        self.schedule_timeout(distribution_id);

        Ok(result)
    }

    pub fn history(&self, limit: usize) -> Vec<DistributionStatus> {
        self.history.read().latest(limit).into_iter().cloned().collect()
    }

    pub fn find(&self, distribution_id: Uuid) -> Option<DistributionStatus> {
        if let Some(status) = self.active.read().get(&distribution_id) {
            return Some(status.clone());
        }
        self.history.read().iter().find(|d| d.id == distribution_id).cloned()
    }
}
