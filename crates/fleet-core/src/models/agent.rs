//! Agent identity, registration record, and status snapshot — the Registry
//! owns all three once an agent exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Pending,
    Active,
    Offline,
    Disconnected,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

/// Stable, immutable-once-registered facts about a managed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: Uuid,
    pub hostname: String,
    pub os_version: String,
    pub app_version: String,
    pub hardware_model: String,
    pub serial_hash: String,
    pub username: String,
    pub registered_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// A point-in-time status snapshot an agent reports on heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: Uuid,
    pub connection_state: ConnectionState,
    pub health_status: HealthStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_policy_sync: Option<DateTime<Utc>>,
    pub active_policy_count: u32,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub freed_bytes: u64,
    pub cleanup_count: u64,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub captured_at: DateTime<Utc>,
}

impl AgentStatus {
    pub fn disk_usage_percent(&self) -> f64 {
        if self.disk_total_bytes == 0 {
            return 0.0;
        }
        (self.disk_used_bytes as f64 / self.disk_total_bytes as f64) * 100.0
    }
}

/// The Registry's authoritative record. `auth_token` is an opaque
/// fingerprint, distinct from a JWT, handed to the agent at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    pub identity: AgentIdentity,
    pub auth_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub capabilities: Vec<String>,
    pub connection_state: ConnectionState,
    pub latest_status: Option<AgentStatus>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredAgent {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.identity.tags.iter().any(|t| t == tag)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}
