//! Registration request/response payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The agent-submitted view of its own identity. `id` is `None` on a first
/// registration (the registry assigns one) and `Some` on a re-registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentityPayload {
    pub id: Option<Uuid>,
    pub hostname: String,
    pub os_version: String,
    pub app_version: String,
    pub hardware_model: String,
    pub serial_hash: String,
    pub username: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub identity: AgentIdentityPayload,
    pub capabilities: Vec<String>,
}

/// Flattened wire shape: `{success, ...}`. Variants carry their own
/// `success` literal so each serializes to the exact shape spec.md
/// documents (`{success:true, agentId, ...}` or `{success:false, message}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistrationResult {
    Success {
        success: bool,
        #[serde(rename = "agentId")]
        agent_id: Uuid,
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "tokenExpiresAt")]
        token_expires_at: DateTime<Utc>,
        #[serde(rename = "heartbeatInterval")]
        heartbeat_interval_seconds: u64,
        #[serde(rename = "serverVersion")]
        server_version: String,
    },
    Pending {
        success: bool,
        pending: bool,
        message: String,
    },
    Failure {
        success: bool,
        message: String,
    },
}

impl RegistrationResult {
    pub fn success(
        agent_id: Uuid,
        auth_token: String,
        token_expires_at: DateTime<Utc>,
        heartbeat_interval_seconds: u64,
        server_version: String,
    ) -> Self {
        Self::Success {
            success: true,
            agent_id,
            auth_token,
            token_expires_at,
            heartbeat_interval_seconds,
            server_version,
        }
    }

    pub fn pending() -> Self {
        Self::Pending {
            success: false,
            pending: true,
            message: "pending".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_serializes_with_fields() {
        let result = RegistrationResult::success(
            Uuid::new_v4(),
            "token".to_string(),
            Utc::now(),
            30,
            "1.0.0".to_string(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["authToken"], "token");
        assert_eq!(json["success"], true);
    }

    #[test]
    fn pending_result_carries_pending_message() {
        let result = RegistrationResult::pending();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "pending");
    }
}
