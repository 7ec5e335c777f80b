//! Roles, permissions, and the hierarchy between them.
//!
//! This is a pure, static model: no mutation, no failure modes, no
//! database row behind it. Permission strings are a closed enumeration of
//! `resource:verb` pairs, grounded on the teacher's `RoleScope`
//! (`serde(rename_all = "lowercase")`) convention for role-shaped enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Never deserialized: policies and role tables are built in code from the
/// `const` permissions below, not parsed off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Permission(pub &'static str);

impl Permission {
    pub const AGENTS_VIEW: Permission = Permission("agents:view");
    pub const AGENTS_REGISTER: Permission = Permission("agents:register");
    pub const AGENTS_UNREGISTER: Permission = Permission("agents:unregister");
    pub const AGENTS_COMMAND: Permission = Permission("agents:command");
    pub const POLICIES_VIEW: Permission = Permission("policies:view");
    pub const POLICIES_CREATE: Permission = Permission("policies:create");
    pub const POLICIES_UPDATE: Permission = Permission("policies:update");
    pub const POLICIES_DELETE: Permission = Permission("policies:delete");
    pub const POLICIES_DEPLOY: Permission = Permission("policies:deploy");
    pub const REPORTS_VIEW: Permission = Permission("reports:view");
    pub const REPORTS_EXPORT: Permission = Permission("reports:export");
    pub const AUDIT_VIEW: Permission = Permission("audit:view");
    pub const AUDIT_EXPORT: Permission = Permission("audit:export");
    pub const USERS_VIEW: Permission = Permission("users:view");
    pub const USERS_CREATE: Permission = Permission("users:create");
    pub const USERS_UPDATE: Permission = Permission("users:update");
    pub const USERS_DELETE: Permission = Permission("users:delete");
    pub const SYSTEM_CONFIG_VIEW: Permission = Permission("system:config_view");
    pub const SYSTEM_CONFIG_UPDATE: Permission = Permission("system:config_update");

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// The `resource` half of a `resource:verb` permission string.
    pub fn category(&self) -> &'static str {
        self.0.split(':').next().unwrap_or(self.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::AGENTS_VIEW,
    Permission::POLICIES_VIEW,
    Permission::REPORTS_VIEW,
    Permission::AUDIT_VIEW,
];

const OPERATOR_PERMISSIONS: &[Permission] = &[
    Permission::AGENTS_VIEW,
    Permission::AGENTS_REGISTER,
    Permission::AGENTS_UNREGISTER,
    Permission::AGENTS_COMMAND,
    Permission::POLICIES_VIEW,
    Permission::POLICIES_CREATE,
    Permission::POLICIES_UPDATE,
    Permission::POLICIES_DEPLOY,
    Permission::REPORTS_VIEW,
    Permission::REPORTS_EXPORT,
    Permission::AUDIT_VIEW,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::AGENTS_VIEW,
    Permission::AGENTS_REGISTER,
    Permission::AGENTS_UNREGISTER,
    Permission::AGENTS_COMMAND,
    Permission::POLICIES_VIEW,
    Permission::POLICIES_CREATE,
    Permission::POLICIES_UPDATE,
    Permission::POLICIES_DELETE,
    Permission::POLICIES_DEPLOY,
    Permission::REPORTS_VIEW,
    Permission::REPORTS_EXPORT,
    Permission::AUDIT_VIEW,
    Permission::AUDIT_EXPORT,
    Permission::USERS_VIEW,
    Permission::USERS_CREATE,
    Permission::USERS_UPDATE,
    Permission::USERS_DELETE,
    Permission::SYSTEM_CONFIG_VIEW,
    Permission::SYSTEM_CONFIG_UPDATE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unrecognized role: {0:?}")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Strict hierarchy level used by `hasAtLeastPrivilegesOf` and the
    /// Access Controller's `minimumRole` check.
    pub fn level(&self) -> u8 {
        match self {
            Role::Admin => 100,
            Role::Operator => 50,
            Role::Viewer => 10,
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Operator => OPERATOR_PERMISSIONS,
            Role::Viewer => VIEWER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn has_at_least_privileges_of(&self, other: Role) -> bool {
        self.level() >= other.level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "operator" => Ok(Role::Operator),
            "viewer" => Ok(Role::Viewer),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}
