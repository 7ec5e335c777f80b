//! Request/response envelopes the Access Controller and services exchange
//! with whatever external transport parses and frames the wire bytes.
//!
//! Nothing here binds to HTTP, a socket, or a framing format; these are
//! plain, serializable data types.

use crate::version::ProtocolVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub message_id: Uuid,
    #[serde(rename = "type")]
    pub message_type: String,
    pub protocol_version: ProtocolVersion,
    pub agent_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<ServerError>,
    pub correlation_id: Option<Uuid>,
}

impl ServerResponse {
    pub fn ok(data: serde_json::Value, correlation_id: Option<Uuid>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            correlation_id,
        }
    }

    pub fn fail(code: &str, message: impl Into<String>, correlation_id: Option<Uuid>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ServerError {
                code: code.to_string(),
                message: message.into(),
                details: None,
            }),
            correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes;
    use crate::version::CURRENT_PROTOCOL_VERSION;

    #[test]
    fn ok_response_carries_no_error() {
        let response = ServerResponse::ok(serde_json::json!({"ok": true}), None);
        assert!(response.success);
        assert!(response.error.is_none());
    }

    #[test]
    fn fail_response_carries_code_and_message() {
        let response = ServerResponse::fail(error_codes::FORBIDDEN, "nope", None);
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, "FORBIDDEN");
    }

    #[test]
    fn message_round_trips_through_json() {
        let message = ServerMessage {
            message_id: Uuid::new_v4(),
            message_type: "heartbeat".to_string(),
            protocol_version: CURRENT_PROTOCOL_VERSION,
            agent_id: Some(Uuid::new_v4()),
            payload: serde_json::json!({"foo": "bar"}),
            timestamp: Utc::now(),
            correlation_id: None,
        };
        let json = serde_json::to_string(&message).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
