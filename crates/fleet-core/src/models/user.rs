//! The human/API caller record. Creation is an admin flow out of scope for
//! this core; storage lives behind an external user store this crate only
//! reads from via [`UserStore`].

use super::rbac::{Permission, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.active && self.role.has_permission(permission)
    }
}

/// Read-only seam over wherever user records actually live. The core never
/// creates or mutates users; it only needs to resolve a `sub` claim back to
/// a role/active-flag pair during authorization.
pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: Uuid) -> Option<User>;
}

/// A trivial in-memory store, useful for tests and for a conforming
/// reference deployment that doesn't wire up a real user directory.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: parking_lot::RwLock<std::collections::HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users.write().insert(user.id, user);
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.read().get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: Role, active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            active,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn inactive_user_has_no_permissions() {
        let user = sample_user(Role::Admin, false);
        assert!(!user.has_permission(Permission::AGENTS_VIEW));
    }

    #[test]
    fn active_user_inherits_role_permissions() {
        let user = sample_user(Role::Viewer, true);
        assert!(user.has_permission(Permission::AGENTS_VIEW));
        assert!(!user.has_permission(Permission::AGENTS_REGISTER));
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryUserStore::new();
        let user = sample_user(Role::Operator, true);
        store.insert(user.clone());
        assert_eq!(store.find_by_id(user.id), Some(user));
    }
}
