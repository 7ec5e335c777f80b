//! Distribution state machine types, owned exclusively by the Distributor.

use super::agent::ConnectionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionState {
    Pending,
    InProgress,
    Completed,
    PartiallyCompleted,
    Failed,
    Cancelled,
    RollingBack,
    RolledBack,
}

/// Per-agent states: the outer aggregate states `partially_completed`,
/// `rolling_back`, and `rolled_back` have no per-agent counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentDistributionState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Target resolution grammar. `Combined` recurses into its sub-targets and
/// the Distributor unions + dedups the resolved agent ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    All,
    Agents(Vec<Uuid>),
    Tags(Vec<String>),
    Capabilities(Vec<String>),
    Filter(TargetFilter),
    Combined(Vec<Target>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TargetFilter {
    pub connection_state: Option<ConnectionState>,
    pub required_tags: Vec<String>,
    pub required_capabilities: Vec<String>,
    pub exclude_ids: Vec<Uuid>,
    pub registered_after: Option<DateTime<Utc>>,
    pub max_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDistributionStatus {
    pub agent_id: Uuid,
    pub state: AgentDistributionState,
    pub policy_version: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AgentDistributionStatus {
    pub fn pending(agent_id: Uuid, policy_version: u64) -> Self {
        Self {
            agent_id,
            state: AgentDistributionState::Pending,
            policy_version,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            error_message: None,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStatus {
    pub id: Uuid,
    pub policy_name: String,
    pub policy_version: u64,
    pub target: Target,
    pub state: DistributionState,
    pub agent_statuses: HashMap<Uuid, AgentDistributionStatus>,
    pub initiated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub initiated_by: Uuid,
    pub message: Option<String>,
    /// Supplemented per the spec's own open question: carrying the payload
    /// alongside the status makes `retryFailed` self-contained instead of
    /// depending on the transport layer to re-supply it.
    pub policy_payload: serde_json::Value,
}

impl DistributionStatus {
    pub fn total_agents(&self) -> usize {
        self.agent_statuses.len()
    }

    pub fn successful_agents(&self) -> usize {
        self.count_in_state(AgentDistributionState::Completed)
    }

    pub fn failed_agents(&self) -> usize {
        self.count_in_state(AgentDistributionState::Failed)
    }

    pub fn cancelled_agents(&self) -> usize {
        self.count_in_state(AgentDistributionState::Cancelled)
    }

    fn count_in_state(&self, state: AgentDistributionState) -> usize {
        self.agent_statuses
            .values()
            .filter(|s| s.state == state)
            .count()
    }

    pub fn has_pending_or_in_progress(&self) -> bool {
        self.agent_statuses.values().any(|s| {
            matches!(
                s.state,
                AgentDistributionState::Pending | AgentDistributionState::InProgress
            )
        })
    }

    pub fn success_rate(&self) -> f64 {
        if self.agent_statuses.is_empty() {
            return 0.0;
        }
        (self.successful_agents() as f64 / self.agent_statuses.len() as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_percentage_of_completed() {
        let mut status = sample_status();
        status.agent_statuses.insert(
            Uuid::new_v4(),
            completed_entry(),
        );
        status.agent_statuses.insert(
            Uuid::new_v4(),
            failed_entry(),
        );
        assert_eq!(status.success_rate(), 50.0);
    }

    fn completed_entry() -> AgentDistributionStatus {
        let mut entry = AgentDistributionStatus::pending(Uuid::new_v4(), 1);
        entry.state = AgentDistributionState::Completed;
        entry
    }

    fn failed_entry() -> AgentDistributionStatus {
        let mut entry = AgentDistributionStatus::pending(Uuid::new_v4(), 1);
        entry.state = AgentDistributionState::Failed;
        entry
    }

    fn sample_status() -> DistributionStatus {
        DistributionStatus {
            id: Uuid::new_v4(),
            policy_name: "cache-cleanup".to_string(),
            policy_version: 1,
            target: Target::All,
            state: DistributionState::InProgress,
            agent_statuses: HashMap::new(),
            initiated_at: Utc::now(),
            started_at: None,
            completed_at: None,
            initiated_by: Uuid::new_v4(),
            message: None,
            policy_payload: serde_json::json!({}),
        }
    }
}
