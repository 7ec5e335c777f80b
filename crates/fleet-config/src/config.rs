//! Core configuration structures for the fleet control plane

use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(test)]
use proptest_derive::Arbitrary;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FleetConfig {
    #[validate(nested)]
    pub registry: RegistryConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub access_control: AccessControlConfig,
    #[validate(nested)]
    pub heartbeat: HeartbeatConfig,
    #[validate(nested)]
    pub distributor: DistributorConfig,
    #[validate(nested)]
    pub compliance: ComplianceConfig,
    #[validate(nested)]
    pub registration: RegistrationConfig,
    pub logging: LoggingConfig,
}

/// Agent Registry limits (component C).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct RegistryConfig {
    #[cfg_attr(test, proptest(strategy = "1usize..=100_000"))]
    #[validate(range(min = 1))]
    pub max_agents: usize,
    pub allow_reregistration: bool,
    #[cfg_attr(test, proptest(strategy = "1usize..=1000"))]
    #[validate(range(min = 1))]
    pub heartbeat_history_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_agents: 10_000,
            allow_reregistration: true,
            heartbeat_history_capacity: 100,
        }
    }
}

/// JWT Provider configuration (component B).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[serde(skip_serializing)]
    pub secret: secrecy::Secret<String>,
    #[validate(length(min = 1))]
    pub issuer: String,
    pub audience: Option<String>,
    #[validate(range(min = 1))]
    pub access_ttl_seconds: i64,
    #[validate(range(min = 1))]
    pub refresh_ttl_seconds: i64,
    #[validate(range(min = 1))]
    pub max_revoked_tokens: usize,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: secrecy::Secret::new("change-me-in-production-please-32chars".to_string()),
            issuer: "fleet-control-plane".to_string(),
            audience: Some("fleet-control-plane".to_string()),
            access_ttl_seconds: 3600,
            refresh_ttl_seconds: 604_800,
            max_revoked_tokens: 10_000,
        }
    }
}

/// Access Controller configuration (component D).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct AccessControlConfig {
    pub default_policy: DefaultPolicyMode,
    pub audit_denials_only: bool,
    #[cfg_attr(test, proptest(strategy = "1usize..=10_000"))]
    #[validate(range(min = 1))]
    pub max_audit_entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicyMode {
    Deny,
    Allow,
    AuthenticatedOnly,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            default_policy: DefaultPolicyMode::Deny,
            audit_denials_only: false,
            max_audit_entries: 5_000,
        }
    }
}

/// Heartbeat Monitor configuration (component F).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HeartbeatConfig {
    #[validate(range(min = 1))]
    pub expected_interval_secs: u64,
    #[validate(range(min = 1))]
    pub missed_threshold: u32,
    #[validate(range(min = 1))]
    pub check_interval_secs: u64,
    pub auto_remove_stale: bool,
    #[validate(range(min = 1))]
    pub stale_timeout_secs: u64,
}

impl HeartbeatConfig {
    pub fn offline_threshold_secs(&self) -> u64 {
        self.expected_interval_secs * self.missed_threshold as u64
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            expected_interval_secs: 30,
            missed_threshold: 3,
            check_interval_secs: 15,
            auto_remove_stale: false,
            stale_timeout_secs: 86_400,
        }
    }
}

/// Policy Distributor configuration (component G).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DistributorConfig {
    #[validate(range(min = 1))]
    pub max_concurrent_distributions: usize,
    #[validate(range(min = 1))]
    pub acknowledgement_timeout_secs: u64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub minimum_success_rate: f64,
    #[validate(range(min = 1))]
    pub max_retry_attempts: u32,
    #[validate(range(min = 1))]
    pub history_capacity: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_distributions: 10,
            acknowledgement_timeout_secs: 60,
            minimum_success_rate: 80.0,
            max_retry_attempts: 3,
            history_capacity: 1000,
        }
    }
}

/// Compliance Reporter score weights (component H). Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct ComplianceConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub policy_weight: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub health_weight: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub connectivity_weight: f64,
}

impl ComplianceConfig {
    pub fn weights_sum_to_one(&self) -> bool {
        (self.policy_weight + self.health_weight + self.connectivity_weight - 1.0).abs() < 1e-6
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            policy_weight: 0.4,
            health_weight: 0.3,
            connectivity_weight: 0.3,
        }
    }
}

/// Registration Service configuration (component E).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegistrationConfig {
    #[validate(length(min = 1))]
    pub minimum_app_version: String,
    pub required_capabilities: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            minimum_app_version: "1.0.0".to_string(),
            required_capabilities: vec!["cleanup".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            jwt: JwtConfig::default(),
            access_control: AccessControlConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            distributor: DistributorConfig::default(),
            compliance: ComplianceConfig::default(),
            registration: RegistrationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
