//! Pure resource-pattern matching and the `AccessPolicy` data type.
//!
//! Split out of `access_controller.rs` the way the teacher separates
//! `services/authorization/{service,policy}.rs`: this module owns pattern
//! matching and policy data, the controller owns session state and
//! orchestration.

use crate::models::{Permission, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub pattern: String,
    pub methods: Vec<HttpMethod>,
    pub required_permissions: Vec<Permission>,
    pub minimum_role: Option<Role>,
    pub requires_authentication: bool,
}

impl AccessPolicy {
    pub fn matches(&self, method: HttpMethod, resource: &str) -> bool {
        self.methods.contains(&method) && pattern_matches(&self.pattern, resource)
    }
}

/// Resource patterns match by: exact equality; a trailing `*` as a prefix
/// wildcard (also covers multi-segment suffixes since this is a plain
/// string-prefix check, not segment-bounded); or segment-wise match where a
/// `{name}` segment matches any single non-empty segment.
pub fn pattern_matches(pattern: &str, resource: &str) -> bool {
    if pattern == resource {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return resource.starts_with(prefix);
    }
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let resource_segments: Vec<&str> = resource.split('/').collect();
    if pattern_segments.len() != resource_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(resource_segments.iter())
        .all(|(pattern_seg, resource_seg)| {
            if pattern_seg.starts_with('{') && pattern_seg.ends_with('}') {
                !resource_seg.is_empty()
            } else {
                pattern_seg == resource_seg
            }
        })
}

/// The default access-policy table from the control plane's external
/// interface contract. Registered in order; the first matching entry wins.
pub fn default_policies() -> Vec<AccessPolicy> {
    use HttpMethod::*;
    vec![
        AccessPolicy {
            pattern: "/api/v1/health".into(),
            methods: vec![Get],
            required_permissions: vec![],
            minimum_role: None,
            requires_authentication: false,
        },
        AccessPolicy {
            pattern: "/api/v1/auth/login".into(),
            methods: vec![Post],
            required_permissions: vec![],
            minimum_role: None,
            requires_authentication: false,
        },
        AccessPolicy {
            pattern: "/api/v1/auth/refresh".into(),
            methods: vec![Post],
            required_permissions: vec![],
            minimum_role: None,
            requires_authentication: false,
        },
        AccessPolicy {
            pattern: "/api/v1/agents".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::AGENTS_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/agents/register".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::AGENTS_REGISTER],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/agents/{id}".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::AGENTS_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/agents/{id}".into(),
            methods: vec![Delete],
            required_permissions: vec![Permission::AGENTS_UNREGISTER],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/agents/{id}/command".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::AGENTS_COMMAND],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::POLICIES_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::POLICIES_CREATE],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies/{id}".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::POLICIES_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies/{id}".into(),
            methods: vec![Put, Patch],
            required_permissions: vec![Permission::POLICIES_UPDATE],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies/{id}".into(),
            methods: vec![Delete],
            required_permissions: vec![Permission::POLICIES_DELETE],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/policies/{id}/deploy".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::POLICIES_DEPLOY],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/reports/*".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::REPORTS_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/reports/{id}/export".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::REPORTS_EXPORT],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/audit/logs".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::AUDIT_VIEW],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/audit/logs/export".into(),
            methods: vec![Post],
            required_permissions: vec![Permission::AUDIT_EXPORT],
            minimum_role: None,
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/users/*".into(),
            methods: vec![Get, Post, Put, Patch, Delete],
            required_permissions: vec![],
            minimum_role: Some(Role::Admin),
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/config".into(),
            methods: vec![Get],
            required_permissions: vec![Permission::SYSTEM_CONFIG_VIEW],
            minimum_role: Some(Role::Admin),
            requires_authentication: true,
        },
        AccessPolicy {
            pattern: "/api/v1/config".into(),
            methods: vec![Put],
            required_permissions: vec![Permission::SYSTEM_CONFIG_UPDATE],
            minimum_role: Some(Role::Admin),
            requires_authentication: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(pattern_matches("/api/v1/health", "/api/v1/health"));
        assert!(!pattern_matches("/api/v1/health", "/api/v1/healthz"));
    }

    #[test]
    fn prefix_wildcard_matches_any_suffix() {
        assert!(pattern_matches("/api/v1/reports/*", "/api/v1/reports/2024-01"));
        assert!(pattern_matches(
            "/api/v1/reports/*",
            "/api/v1/reports/2024-01/export"
        ));
        assert!(!pattern_matches("/api/v1/reports/*", "/api/v1/other"));
    }

    #[test]
    fn segment_wildcard_matches_single_nonempty_segment() {
        assert!(pattern_matches(
            "/api/v1/agents/{id}",
            "/api/v1/agents/550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!pattern_matches("/api/v1/agents/{id}", "/api/v1/agents"));
        assert!(!pattern_matches(
            "/api/v1/agents/{id}",
            "/api/v1/agents/abc/extra"
        ));
    }

    #[test]
    fn segment_wildcard_rejects_empty_segment() {
        assert!(!pattern_matches("/api/v1/agents/{id}", "/api/v1/agents/"));
    }
}
