//! Error taxonomy shared by every fleet control-plane component.
//!
//! Leaf components return these unchanged; the Access Controller is the
//! only place that maps them onto an HTTP-shaped `(status, code)` pair via
//! [`FleetError::status_mapping`].

use fleet_protocol::error_codes;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FleetError {
    // --- Authentication ---
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("session expired")]
    SessionExpired,

    // --- Authorization ---
    #[error("forbidden: missing permission {permission}")]
    Forbidden { permission: String },
    #[error("insufficient privileges: required {required}, have {actual}")]
    InsufficientPrivileges { required: String, actual: String },
    #[error("user account disabled")]
    UserDisabled,

    // --- NotFound ---
    #[error("user not found")]
    UserNotFound,
    #[error("agent not found: {id}")]
    AgentNotFound { id: Uuid },
    #[error("policy not found: {name}")]
    PolicyNotFound { name: String },
    #[error("distribution not found: {id}")]
    DistributionNotFound { id: Uuid },

    // --- Conflict ---
    #[error("agent already registered: {id}")]
    AgentAlreadyRegistered { id: Uuid },
    #[error("distribution already in progress: {id}")]
    DistributionAlreadyInProgress { id: Uuid },
    #[error("maximum agent count reached")]
    MaxAgentsReached,

    // --- Precondition ---
    #[error("target resolved to no agents")]
    NoTargetAgents,
    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },
    #[error("invalid date range")]
    InvalidDateRange,
    #[error("agent app version too old: {actual} < {minimum}")]
    VersionTooOld { actual: String, minimum: String },
    #[error("agent missing required capabilities: {missing:?}")]
    MissingCapabilities { missing: Vec<String> },

    // --- Transient ---
    #[error("agent not reachable: {id}")]
    AgentNotReachable { id: Uuid },
    #[error("maximum retry attempts exceeded: {id}")]
    MaxRetriesExceeded { id: Uuid },

    // --- Infrastructure ---
    #[error("encoding failed: {reason}")]
    EncodingFailed { reason: String },
    #[error("decoding failed: {reason}")]
    DecodingFailed { reason: String },
    #[error("export failed: {reason}")]
    ExportFailed { reason: String },
}

impl FleetError {
    /// The `(status, code)` pair the Access Controller's HTTP status
    /// mapping table (spec's External Interfaces section) assigns to each
    /// error kind. Errors that never cross the Access Controller (e.g.
    /// `NoTargetAgents`) still get a reasonable mapping for callers that
    /// want one directly.
    pub fn status_mapping(&self) -> (u16, &'static str) {
        match self {
            FleetError::Unauthorized
            | FleetError::InvalidToken
            | FleetError::TokenExpired
            | FleetError::SessionExpired => (401, error_codes::UNAUTHORIZED),

            FleetError::Forbidden { .. }
            | FleetError::InsufficientPrivileges { .. }
            | FleetError::UserDisabled => (403, error_codes::FORBIDDEN),

            FleetError::UserNotFound
            | FleetError::AgentNotFound { .. }
            | FleetError::PolicyNotFound { .. }
            | FleetError::DistributionNotFound { .. } => (404, error_codes::NOT_FOUND),

            FleetError::AgentAlreadyRegistered { .. }
            | FleetError::DistributionAlreadyInProgress { .. }
            | FleetError::MaxAgentsReached
            | FleetError::NoTargetAgents
            | FleetError::InvalidTarget { .. }
            | FleetError::InvalidDateRange
            | FleetError::VersionTooOld { .. }
            | FleetError::MissingCapabilities { .. } => (400, error_codes::INVALID_REQUEST),

            FleetError::AgentNotReachable { .. } | FleetError::MaxRetriesExceeded { .. } => {
                (409, error_codes::INVALID_REQUEST)
            }

            FleetError::EncodingFailed { .. }
            | FleetError::DecodingFailed { .. }
            | FleetError::ExportFailed { .. } => (500, error_codes::SERVER_ERROR),
        }
    }
}

impl From<fleet_crypto::JwtError> for FleetError {
    fn from(err: fleet_crypto::JwtError) -> Self {
        match err {
            fleet_crypto::JwtError::TokenExpired => FleetError::TokenExpired,
            fleet_crypto::JwtError::InvalidSignature => FleetError::InvalidToken,
            fleet_crypto::JwtError::InvalidToken
            | fleet_crypto::JwtError::DecodingFailed
            | fleet_crypto::JwtError::InvalidClaim(_) => FleetError::InvalidToken,
        }
    }
}

pub type FleetResult<T> = Result<T, FleetError>;
