//! Bounded audit ring buffers.
//!
//! Two kinds of entries are tracked: access-control decisions (who did
//! what to which resource, allowed or denied, and why) and agent-facing
//! events (registration, heartbeat, distribution, compliance). Both are
//! owned by the component that produces them and capped at a fixed size
//! with oldest-entry eviction, matching every other bounded buffer in this
//! crate (revocation set, distribution history, heartbeat history).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// A fixed-capacity buffer where new entries are inserted at the front and
/// the oldest entry is dropped once capacity is exceeded.
#[derive(Debug)]
pub struct AuditRingBuffer<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> AuditRingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest-first iterator.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Newest-first mutable iterator, for in-place transitions on an
    /// already-archived entry (e.g. distribution rollback).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut()
    }

    pub fn latest(&self, limit: usize) -> Vec<&T> {
        self.entries.iter().take(limit).collect()
    }

    /// Removes and returns the first entry matching `predicate`, for the
    /// rare case an archived entry needs to move back into active state
    /// (e.g. distribution retry).
    pub fn remove_by<F: Fn(&T) -> bool>(&mut self, predicate: F) -> Option<T> {
        let position = self.entries.iter().position(predicate)?;
        self.entries.remove(position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessAuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub resource: String,
    pub method: String,
    pub decision: AccessDecision,
    pub reason: Option<String>,
}

impl AccessAuditEntry {
    pub fn granted(user_id: Option<Uuid>, resource: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id,
            resource: resource.into(),
            method: method.into(),
            decision: AccessDecision::Granted,
            reason: None,
        }
    }

    pub fn denied(
        user_id: Option<Uuid>,
        resource: impl Into<String>,
        method: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id,
            resource: resource.into(),
            method: method.into(),
            decision: AccessDecision::Denied,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Registration,
    Heartbeat,
    Distribution,
    Compliance,
    System,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentAuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<Uuid>,
    pub severity: AuditSeverity,
    pub category: AuditCategory,
    pub message: String,
}

impl AgentAuditEntry {
    pub fn new(
        agent_id: Option<Uuid>,
        severity: AuditSeverity,
        category: AuditCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_id,
            severity,
            category,
            message: message.into(),
        }
    }
}

/// Mirrors the teacher's `tracing`-backed audit sink: every entry is also
/// emitted on the `"audit"` target so it can be routed independently of
/// ordinary application logs.
pub fn emit_access_audit(entry: &AccessAuditEntry) {
    match entry.decision {
        AccessDecision::Granted => tracing::info!(
            target: "audit",
            resource = %entry.resource,
            method = %entry.method,
            user_id = ?entry.user_id,
            "access granted"
        ),
        AccessDecision::Denied => tracing::warn!(
            target: "audit",
            resource = %entry.resource,
            method = %entry.method,
            user_id = ?entry.user_id,
            reason = ?entry.reason,
            "access denied"
        ),
    }
}

pub fn emit_agent_audit(entry: &AgentAuditEntry) {
    tracing::info!(
        target: "audit",
        agent_id = ?entry.agent_id,
        category = ?entry.category,
        severity = ?entry.severity,
        "{}",
        entry.message
    );
}
