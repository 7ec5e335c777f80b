//! Access Controller (component D): RBAC- and policy-gated request
//! authorization, with a session cache and audit trail.
//!
//! Grounded on the teacher's `AuthorizationService`/`PolicyEngine` split
//! (`services/authorization/{service,policy}.rs`): this module owns the
//! session cache and the eight-step algorithm, `policy.rs` owns pattern
//! matching and the pure `AccessPolicy` type.

use super::policy::{default_policies, AccessPolicy, HttpMethod};
use crate::audit::{emit_access_audit, AccessAuditEntry, AuditRingBuffer};
use crate::error::{FleetError, FleetResult};
use crate::models::{Role, UserStore};
use fleet_config::{AccessControlConfig, DefaultPolicyMode};
use fleet_crypto::{JwtClaims, JwtProvider, TokenType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct AccessGrant {
    pub user_id: Uuid,
    pub role: Role,
    pub claims: JwtClaims,
}

pub struct AccessController {
    config: AccessControlConfig,
    policies: Vec<AccessPolicy>,
    jwt_provider: Arc<JwtProvider>,
    user_store: Arc<dyn UserStore>,
    sessions: RwLock<HashMap<Uuid, JwtClaims>>,
    audit: RwLock<AuditRingBuffer<AccessAuditEntry>>,
}

impl AccessController {
    pub fn new(
        config: AccessControlConfig,
        jwt_provider: Arc<JwtProvider>,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        let max_audit_entries = config.max_audit_entries;
        Self {
            config,
            policies: default_policies(),
            jwt_provider,
            user_store,
            sessions: RwLock::new(HashMap::new()),
            audit: RwLock::new(AuditRingBuffer::new(max_audit_entries)),
        }
    }

    pub fn with_policies(mut self, policies: Vec<AccessPolicy>) -> Self {
        self.policies = policies;
        self
    }

    fn find_policy(&self, method: HttpMethod, resource: &str) -> Option<&AccessPolicy> {
        self.policies.iter().find(|p| p.matches(method, resource))
    }

    pub fn authorize(
        &self,
        token: Option<&str>,
        resource: &str,
        method: HttpMethod,
    ) -> FleetResult<AccessGrant> {
        let result = self.authorize_inner(token, resource, method);
        self.record_audit(token, resource, method, &result);
        result
    }

    fn authorize_inner(
        &self,
        token: Option<&str>,
        resource: &str,
        method: HttpMethod,
    ) -> FleetResult<AccessGrant> {
        // Step 1: find the first matching policy.
        let policy = match self.find_policy(method, resource) {
            Some(policy) => policy,
            None => {
                return match self.config.default_policy {
                    DefaultPolicyMode::Deny => {
                        if token.is_none() {
                            Err(FleetError::Unauthorized)
                        } else {
                            Err(FleetError::Forbidden {
                                permission: "none".to_string(),
                            })
                        }
                    }
                    DefaultPolicyMode::Allow => self.anonymous_grant(),
                    DefaultPolicyMode::AuthenticatedOnly => match token {
                        Some(t) => self.validate_and_build_grant(t),
                        None => Err(FleetError::Unauthorized),
                    },
                };
            }
        };

        // Step 2: unauthenticated policies short-circuit when no token is given.
        if !policy.requires_authentication && token.is_none() {
            return self.anonymous_grant();
        }

        // Steps 3-8 require a token.
        let token = token.ok_or(FleetError::Unauthorized)?;
        let grant = self.validate_and_build_grant(token)?;

        // Step 6: minimum role.
        if let Some(minimum_role) = policy.minimum_role {
            if !grant.role.has_at_least_privileges_of(minimum_role) {
                return Err(FleetError::InsufficientPrivileges {
                    required: minimum_role.to_string(),
                    actual: grant.role.to_string(),
                });
            }
        }

        // Step 7: required permissions (any-of).
        if !policy.required_permissions.is_empty() {
            let has_any = policy
                .required_permissions
                .iter()
                .any(|p| grant.role.has_permission(*p));
            if !has_any {
                let first_missing = policy.required_permissions[0];
                return Err(FleetError::Forbidden {
                    permission: first_missing.to_string(),
                });
            }
        }

        // Step 8: cache and return.
        self.sessions.write().insert(grant.user_id, grant.claims.clone());
        Ok(grant)
    }

    /// Steps 3-5: validate the JWT, require an access token, and resolve
    /// the subject to a known, active user.
    fn validate_and_build_grant(&self, token: &str) -> FleetResult<AccessGrant> {
        let claims = self.jwt_provider.validate(token).map_err(|err| match err {
            fleet_crypto::JwtError::TokenExpired => FleetError::TokenExpired,
            _ => FleetError::InvalidToken,
        })?;

        if claims.token_type != TokenType::Access {
            return Err(FleetError::InvalidToken);
        }

        let user_id: Uuid = claims.sub.parse().map_err(|_| FleetError::InvalidToken)?;

        let role: Role = claims.role.parse().map_err(|_| FleetError::InvalidToken)?;

        if let Some(user) = self.user_store.find_by_id(user_id) {
            if !user.active {
                return Err(FleetError::UserDisabled);
            }
        }

        Ok(AccessGrant {
            user_id,
            role,
            claims,
        })
    }

    fn anonymous_grant(&self) -> FleetResult<AccessGrant> {
        Ok(AccessGrant {
            user_id: Uuid::nil(),
            role: Role::Viewer,
            claims: JwtClaims {
                iss: String::new(),
                sub: Uuid::nil().to_string(),
                aud: String::new(),
                exp: 0,
                iat: 0,
                nbf: 0,
                jti: String::new(),
                role: Role::Viewer.to_string(),
                username: String::new(),
                email: String::new(),
                token_type: TokenType::Access,
            },
        })
    }

    fn record_audit(
        &self,
        token: Option<&str>,
        resource: &str,
        method: HttpMethod,
        result: &FleetResult<AccessGrant>,
    ) {
        let method_str = format!("{method:?}");
        let entry = match result {
            Ok(grant) => {
                if self.config.audit_denials_only {
                    return;
                }
                AccessAuditEntry::granted(Some(grant.user_id), resource, method_str)
            }
            Err(err) => {
                let user_id = token
                    .and_then(|t| self.jwt_provider.validate(t).ok())
                    .and_then(|c| c.sub.parse().ok());
                AccessAuditEntry::denied(user_id, resource, method_str, err.to_string())
            }
        };
        emit_access_audit(&entry);
        self.audit.write().push(entry);
    }

    pub fn cached_claims(&self, user_id: Uuid) -> Option<JwtClaims> {
        self.sessions.read().get(&user_id).cloned()
    }

    pub fn audit_entries(&self, limit: usize) -> Vec<AccessAuditEntry> {
        self.audit.read().latest(limit).into_iter().cloned().collect()
    }

    /// HTTP status + stable code for an error, per the external-interface
    /// status-mapping table.
    pub fn status_for(&self, error: &FleetError) -> (u16, &'static str) {
        error.status_mapping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InMemoryUserStore;
    use fleet_crypto::{JwtProviderConfig, NewTokenParams};

    fn controller() -> (AccessController, Arc<JwtProvider>) {
        let jwt = Arc::new(JwtProvider::new(JwtProviderConfig::default()));
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let controller = AccessController::new(AccessControlConfig::default(), jwt.clone(), users);
        (controller, jwt)
    }

    fn mint(jwt: &JwtProvider, role: &str) -> String {
        jwt.generate_token_pair(NewTokenParams {
            user_id: Uuid::new_v4(),
            username: "alice",
            email: "a@example.com",
            role,
        })
        .access_token
    }

    #[test]
    fn health_check_allows_no_token() {
        let (controller, _jwt) = controller();
        let grant = controller
            .authorize(None, "/api/v1/health", HttpMethod::Get)
            .unwrap();
        assert_eq!(grant.role, Role::Viewer);
    }

    #[test]
    fn unmatched_resource_with_no_token_is_unauthorized() {
        let (controller, _jwt) = controller();
        let err = controller
            .authorize(None, "/not/a/real/path", HttpMethod::Get)
            .unwrap_err();
        assert_eq!(err, FleetError::Unauthorized);
    }

    #[test]
    fn unmatched_resource_with_token_is_forbidden() {
        let (controller, jwt) = controller();
        let token = mint(&jwt, "viewer");
        let err = controller
            .authorize(Some(&token), "/not/a/real/path", HttpMethod::Get)
            .unwrap_err();
        assert_eq!(
            err,
            FleetError::Forbidden {
                permission: "none".to_string()
            }
        );
    }

    #[test]
    fn wildcard_reports_policy_grants_viewer_then_denies_export() {
        let (controller, jwt) = controller();
        let token = mint(&jwt, "viewer");
        assert!(controller
            .authorize(Some(&token), "/api/v1/reports/2024-01", HttpMethod::Get)
            .is_ok());
        let err = controller
            .authorize(
                Some(&token),
                "/api/v1/reports/2024-01/export",
                HttpMethod::Post,
            )
            .unwrap_err();
        assert_eq!(
            err,
            FleetError::Forbidden {
                permission: "reports:export".to_string()
            }
        );
    }

    #[test]
    fn path_parameter_export_policy_grants_operator() {
        let (controller, jwt) = controller();
        let token = mint(&jwt, "operator");
        let grant = controller
            .authorize(
                Some(&token),
                "/api/v1/reports/2024-01/export",
                HttpMethod::Post,
            )
            .unwrap();
        assert_eq!(grant.role, Role::Operator);
    }

    #[test]
    fn path_parameter_policy_grants_operator() {
        let (controller, jwt) = controller();
        let token = mint(&jwt, "operator");
        let grant = controller
            .authorize(
                Some(&token),
                "/api/v1/agents/550e8400-e29b-41d4-a716-446655440000",
                HttpMethod::Get,
            )
            .unwrap();
        assert_eq!(grant.role, Role::Operator);
    }

    #[test]
    fn admin_only_policy_rejects_operator() {
        let (controller, jwt) = controller();
        let token = mint(&jwt, "operator");
        let err = controller
            .authorize(Some(&token), "/api/v1/users/42", HttpMethod::Get)
            .unwrap_err();
        assert!(matches!(err, FleetError::InsufficientPrivileges { .. }));
    }

    #[test]
    fn expired_token_maps_to_token_expired() {
        let jwt = Arc::new(JwtProvider::new(JwtProviderConfig {
            access_ttl_seconds: 1,
            ..JwtProviderConfig::default()
        }));
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let controller = AccessController::new(AccessControlConfig::default(), jwt.clone(), users);
        let token = mint(&jwt, "viewer");
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let err = controller
            .authorize(Some(&token), "/api/v1/agents", HttpMethod::Get)
            .unwrap_err();
        assert_eq!(err, FleetError::TokenExpired);
    }
}
