//! Heartbeat request/response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatePayload {
    Pending,
    Active,
    Offline,
    Disconnected,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatusPayload {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

/// The agent-submitted status snapshot carried in a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusPayload {
    pub connection_state: ConnectionStatePayload,
    pub health_status: HealthStatusPayload,
    pub active_policy_count: u32,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub freed_bytes: u64,
    pub cleanup_count: u64,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub status: AgentStatusPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub acknowledged: bool,
    pub server_time: DateTime<Utc>,
    pub pending_policies: Vec<String>,
    pub pending_commands: Vec<String>,
    pub next_heartbeat: u64,
}
