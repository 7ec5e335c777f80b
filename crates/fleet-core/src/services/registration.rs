//! Registration Service (component E): the approval workflow gating whether
//! a newly-seen agent identity is admitted to the Registry.
//!
//! Grounded on the teacher's `services/workflow/{engine,rules}.rs` shape —
//! this domain needs no multi-state flow graph, so only the `Rule`-style
//! validation-order pattern survives (see `validate_submission` below), not
//! the full `WorkflowEngine`/`FlowState` machinery.

use crate::error::{FleetError, FleetResult};
use crate::models::AgentIdentity;
use crate::services::registry::AgentRegistry;
use chrono::Utc;
use fleet_config::RegistrationConfig;
use fleet_protocol::{AgentIdentityPayload, RegistrationPayload, RegistrationResult};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ApprovalPolicy {
    AutoApprove,
    ManualApprove,
    WhitelistOnly { allowed_serial_hashes: Vec<String> },
    HostnamePattern { pattern: String },
}

#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub identity: AgentIdentity,
    pub capabilities: Vec<String>,
}

pub struct RegistrationService {
    config: RegistrationConfig,
    approval_policy: ApprovalPolicy,
    registry: Arc<AgentRegistry>,
    pending: RwLock<HashMap<Uuid, PendingRegistration>>,
    server_version: String,
    heartbeat_interval_secs: u64,
}

impl RegistrationService {
    pub fn new(
        config: RegistrationConfig,
        approval_policy: ApprovalPolicy,
        registry: Arc<AgentRegistry>,
        server_version: impl Into<String>,
        heartbeat_interval_secs: u64,
    ) -> Self {
        Self {
            config,
            approval_policy,
            registry,
            pending: RwLock::new(HashMap::new()),
            server_version: server_version.into(),
            heartbeat_interval_secs,
        }
    }

    /// Rule (a): required capabilities must be a subset of submitted ones.
    fn check_capabilities(&self, submitted: &[String]) -> FleetResult<()> {
        let missing: Vec<String> = self
            .config
            .required_capabilities
            .iter()
            .filter(|required| !submitted.iter().any(|c| c == *required))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FleetError::MissingCapabilities { missing })
        }
    }

    /// Rule (b): dotted-numeric version compare, padding the shorter side
    /// with zeros, lexicographic by integer parts.
    fn check_minimum_version(&self, app_version: &str) -> FleetResult<()> {
        if compare_versions(app_version, &self.config.minimum_app_version) == std::cmp::Ordering::Less {
            return Err(FleetError::VersionTooOld {
                actual: app_version.to_string(),
                minimum: self.config.minimum_app_version.clone(),
            });
        }
        Ok(())
    }

    fn validate_submission(&self, identity: &AgentIdentity, capabilities: &[String]) -> FleetResult<()> {
        self.check_capabilities(capabilities)?;
        self.check_minimum_version(&identity.app_version)?;
        Ok(())
    }

    fn passes_approval_policy(&self, identity: &AgentIdentity) -> bool {
        match &self.approval_policy {
            ApprovalPolicy::AutoApprove => true,
            ApprovalPolicy::ManualApprove => false,
            ApprovalPolicy::WhitelistOnly {
                allowed_serial_hashes,
            } => allowed_serial_hashes.iter().any(|h| h == &identity.serial_hash),
            ApprovalPolicy::HostnamePattern { pattern } => {
                Regex::new(&format!("(?i){pattern}"))
                    .map(|re| re.is_match(&identity.hostname))
                    .unwrap_or(false)
            }
        }
    }

    pub fn submit(&self, payload: RegistrationPayload) -> FleetResult<RegistrationResult> {
        let identity = identity_from_payload(payload.identity);
        self.validate_submission(&identity, &payload.capabilities)?;

        if self.passes_approval_policy(&identity) {
            self.approve_and_register(identity, payload.capabilities)
        } else {
            self.pending.write().insert(
                identity.id,
                PendingRegistration {
                    identity,
                    capabilities: payload.capabilities,
                },
            );
            tracing::info!("registrationPending");
            Ok(RegistrationResult::pending())
        }
    }

    fn approve_and_register(
        &self,
        identity: AgentIdentity,
        capabilities: Vec<String>,
    ) -> FleetResult<RegistrationResult> {
        let agent_id = identity.id;
        let registered = self.registry.register(identity, capabilities)?;
        Ok(RegistrationResult::success(
            agent_id,
            registered.auth_token,
            registered.token_expires_at,
            self.heartbeat_interval_secs,
            self.server_version.clone(),
        ))
    }

    pub fn approve_pending(&self, agent_id: Uuid) -> FleetResult<RegistrationResult> {
        let pending = self
            .pending
            .write()
            .remove(&agent_id)
            .ok_or(FleetError::AgentNotFound { id: agent_id })?;
        self.approve_and_register(pending.identity, pending.capabilities)
    }

    pub fn reject_pending(&self, agent_id: Uuid, reason: impl Into<String>) -> FleetResult<()> {
        self.pending
            .write()
            .remove(&agent_id)
            .ok_or(FleetError::AgentNotFound { id: agent_id })?;
        tracing::info!(agent_id = %agent_id, "registrationRejected");
        let _ = reason.into();
        Ok(())
    }

    pub fn bulk_approve(&self, agent_ids: &[Uuid]) -> Vec<(Uuid, FleetResult<RegistrationResult>)> {
        agent_ids
            .iter()
            .map(|id| (*id, self.approve_pending(*id)))
            .collect()
    }

    pub fn bulk_reject(&self, agent_ids: &[Uuid], reason: &str) -> Vec<(Uuid, FleetResult<()>)> {
        agent_ids
            .iter()
            .map(|id| (*id, self.reject_pending(*id, reason.to_string())))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }
}

fn identity_from_payload(payload: AgentIdentityPayload) -> AgentIdentity {
    AgentIdentity {
        id: payload.id.unwrap_or_else(Uuid::new_v4),
        hostname: payload.hostname,
        os_version: payload.os_version,
        app_version: payload.app_version,
        hardware_model: payload.hardware_model,
        serial_hash: payload.serial_hash,
        username: payload.username,
        registered_at: Utc::now(),
        tags: payload.tags,
    }
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let a_parts: Vec<u64> = a.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    let b_parts: Vec<u64> = b.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    let len = a_parts.len().max(b_parts.len());
    for i in 0..len {
        let x = a_parts.get(i).copied().unwrap_or(0);
        let y = b_parts.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_config::RegistryConfig;

    fn payload(app_version: &str, serial_hash: &str) -> RegistrationPayload {
        RegistrationPayload {
            identity: AgentIdentityPayload {
                id: None,
                hostname: "mac-01".to_string(),
                os_version: "14.5".to_string(),
                app_version: app_version.to_string(),
                hardware_model: "MacBookPro18,1".to_string(),
                serial_hash: serial_hash.to_string(),
                username: "alice".to_string(),
                tags: vec![],
            },
            capabilities: vec!["cleanup".to_string()],
        }
    }

    fn service(policy: ApprovalPolicy) -> RegistrationService {
        let registry = Arc::new(AgentRegistry::new(RegistryConfig::default()));
        RegistrationService::new(
            RegistrationConfig {
                minimum_app_version: "1.0.0".to_string(),
                required_capabilities: vec!["cleanup".to_string()],
            },
            policy,
            registry,
            "1.0.0",
            30,
        )
    }

    #[test]
    fn auto_approve_registers_immediately() {
        let service = service(ApprovalPolicy::AutoApprove);
        let result = service.submit(payload("1.2.0", "abc")).unwrap();
        assert!(matches!(result, RegistrationResult::Success { .. }));
    }

    #[test]
    fn manual_approve_enqueues_pending() {
        let service = service(ApprovalPolicy::ManualApprove);
        let result = service.submit(payload("1.2.0", "abc")).unwrap();
        assert!(matches!(result, RegistrationResult::Pending { .. }));
        assert_eq!(service.pending_count(), 1);
    }

    #[test]
    fn missing_capability_is_rejected() {
        let service = service(ApprovalPolicy::AutoApprove);
        let mut p = payload("1.2.0", "abc");
        p.capabilities.clear();
        let err = service.submit(p).unwrap_err();
        assert!(matches!(err, FleetError::MissingCapabilities { .. }));
    }

    #[test]
    fn version_below_minimum_is_rejected() {
        let service = service(ApprovalPolicy::AutoApprove);
        let err = service.submit(payload("0.9.0", "abc")).unwrap_err();
        assert!(matches!(err, FleetError::VersionTooOld { .. }));
    }

    #[test]
    fn whitelist_only_defers_unknown_serial_hash() {
        let service = service(ApprovalPolicy::WhitelistOnly {
            allowed_serial_hashes: vec!["known".to_string()],
        });
        let result = service.submit(payload("1.2.0", "unknown")).unwrap();
        assert!(matches!(result, RegistrationResult::Pending { .. }));
    }

    #[test]
    fn whitelist_only_approves_known_serial_hash() {
        let service = service(ApprovalPolicy::WhitelistOnly {
            allowed_serial_hashes: vec!["known".to_string()],
        });
        let result = service.submit(payload("1.2.0", "known")).unwrap();
        assert!(matches!(result, RegistrationResult::Success { .. }));
    }

    #[test]
    fn version_compare_pads_shorter_side_with_zeros() {
        assert_eq!(compare_versions("1.2", "1.2.0"), std::cmp::Ordering::Equal);
        assert_eq!(compare_versions("1.2.1", "1.2"), std::cmp::Ordering::Greater);
        assert_eq!(compare_versions("1.9.0", "1.10.0"), std::cmp::Ordering::Less);
    }

    #[test]
    fn bulk_approve_registers_every_pending_agent() {
        let service = service(ApprovalPolicy::ManualApprove);
        service.submit(payload("1.2.0", "abc")).unwrap();
        let id = {
            let pending = service.pending.read();
            *pending.keys().next().unwrap()
        };
        let results = service.bulk_approve(&[id]);
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
        assert_eq!(service.pending_count(), 0);
    }
}
