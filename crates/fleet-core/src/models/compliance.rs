//! Compliance scoring types. The Reporter owns a cache of these; everything
//! else is read from other components' read APIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Compliant,
    Partially,
    NonCompliant,
    Critical,
}

impl ComplianceLevel {
    pub fn from_score(overall: f64) -> Self {
        if overall >= 90.0 {
            ComplianceLevel::Compliant
        } else if overall >= 70.0 {
            ComplianceLevel::Partially
        } else if overall >= 50.0 {
            ComplianceLevel::NonCompliant
        } else {
            ComplianceLevel::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceScore {
    pub agent_id: Uuid,
    pub policy_score: f64,
    pub health_score: f64,
    pub connectivity_score: f64,
    pub overall: f64,
    pub active_policies: u32,
    pub policies_with_issues: u32,
    pub time_since_heartbeat_secs: Option<i64>,
    pub calculated_at: DateTime<Utc>,
}

impl ComplianceScore {
    pub fn level(&self) -> ComplianceLevel {
        ComplianceLevel::from_score(self.overall)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FleetOverview {
    pub total_agents: usize,
    pub active_agents: usize,
    pub average_score: f64,
    pub compliant_agents: usize,
    pub bucket_counts: HashMap<String, usize>,
    pub policy_deployment_counts: HashMap<String, usize>,
    pub total_bytes_freed: u64,
    pub total_cleanup_operations: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentComplianceReport {
    pub agent_id: Uuid,
    pub score: ComplianceScore,
    pub connection_state: String,
    pub health_status: String,
    pub total_bytes_freed: u64,
    pub cleanup_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyExecutionState {
    Pending,
    Executing,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyExecutionReport {
    pub distribution_id: Uuid,
    pub policy_name: String,
    pub policy_version: u64,
    pub agent_states: HashMap<Uuid, PolicyExecutionState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuditLogSummary {
    pub total_entries: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_category: HashMap<String, usize>,
    pub top_agents: Vec<(Uuid, usize)>,
    pub latest_critical: Vec<String>,
}
