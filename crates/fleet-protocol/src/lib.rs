//! Wire envelope and payload types exchanged between the control plane and
//! whatever external transport frames the bytes. Nothing here is bound to
//! HTTP, a socket, or a serialization format beyond `serde`.

pub mod envelope;
pub mod error_codes;
pub mod heartbeat;
pub mod registration;
pub mod version;

pub use envelope::{ServerError, ServerMessage, ServerResponse};
pub use heartbeat::{
    AgentStatusPayload, ConnectionStatePayload, HealthStatusPayload, HeartbeatRequest,
    HeartbeatResponse,
};
pub use registration::{AgentIdentityPayload, RegistrationPayload, RegistrationResult};
pub use version::{ProtocolVersion, CURRENT_PROTOCOL_VERSION};
