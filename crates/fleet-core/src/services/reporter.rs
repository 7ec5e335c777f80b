//! Compliance Reporter (component H): weighted per-agent scoring plus
//! fleet, agent, execution, and audit reports.
//!
//! The Reporter owns only a cache of [`ComplianceScore`]s it has computed —
//! everything else is read live from the Registry and Distributor through
//! their existing read APIs, the same "downward facade, no callback" shape
//! the Distributor uses against the Registry.

use crate::audit::{AgentAuditEntry, AuditSeverity};
use crate::error::{FleetError, FleetResult};
use crate::models::{
    AgentComplianceReport, AgentDistributionState, ComplianceLevel, ComplianceScore, ConnectionState,
    FleetOverview, HealthStatus, PolicyExecutionReport, PolicyExecutionState, RegisteredAgent,
};
use crate::services::distributor::PolicyDistributor;
use crate::services::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use fleet_config::ComplianceConfig;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::AuditLogSummary;

pub struct ComplianceReporter {
    config: ComplianceConfig,
    registry: Arc<AgentRegistry>,
    distributor: Arc<PolicyDistributor>,
    heartbeat_timeout_secs: u64,
    cache: RwLock<HashMap<Uuid, ComplianceScore>>,
}

impl ComplianceReporter {
    pub fn new(
        config: ComplianceConfig,
        registry: Arc<AgentRegistry>,
        distributor: Arc<PolicyDistributor>,
        heartbeat_timeout_secs: u64,
    ) -> Self {
        Self {
            config,
            registry,
            distributor,
            heartbeat_timeout_secs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn calculate_score(&self, agent: &RegisteredAgent) -> ComplianceScore {
        let now = Utc::now();

        let policy_score: f64 = if agent.latest_status.is_some() { 100.0 } else { 50.0 };

        let health_score: f64 = match &agent.latest_status {
            None => 50.0,
            Some(status) => match status.health_status {
                HealthStatus::Healthy => 100.0,
                HealthStatus::Warning => 70.0,
                HealthStatus::Critical => 30.0,
                HealthStatus::Unknown => 50.0,
            },
        };

        let elapsed_secs = agent.last_heartbeat.map(|t| (now - t).num_seconds());
        let connectivity_score: f64 = if agent.connection_state != ConnectionState::Active {
            if agent.connection_state == ConnectionState::Offline {
                30.0
            } else {
                0.0
            }
        } else {
            match elapsed_secs {
                None => 80.0,
                Some(s) if s < 60 => 100.0,
                Some(s) if s < 300 => 80.0,
                Some(s) if (s as u64) < self.heartbeat_timeout_secs => 60.0,
                _ => 30.0,
            }
        };

        let overall = (self.config.policy_weight * policy_score
            + self.config.health_weight * health_score
            + self.config.connectivity_weight * connectivity_score)
            .clamp(0.0, 100.0);

        let score = ComplianceScore {
            agent_id: agent.id(),
            policy_score: policy_score.clamp(0.0, 100.0),
            health_score: health_score.clamp(0.0, 100.0),
            connectivity_score: connectivity_score.clamp(0.0, 100.0),
            overall,
            active_policies: agent
                .latest_status
                .as_ref()
                .map(|s| s.active_policy_count)
                .unwrap_or(0),
            // Policy-specific failure ingestion is out of scope for this core.
            policies_with_issues: 0,
            time_since_heartbeat_secs: elapsed_secs,
            calculated_at: now,
        };

        self.cache.write().insert(agent.id(), score.clone());
        score
    }

    pub fn cached_score(&self, agent_id: Uuid) -> Option<ComplianceScore> {
        self.cache.read().get(&agent_id).cloned()
    }

    pub fn fleet_overview(&self) -> FleetOverview {
        let agents = self.registry.all_agents();
        let stats = self.registry.statistics();

        let mut overview = FleetOverview {
            total_agents: stats.total_agents,
            active_agents: stats.active_agents,
            ..Default::default()
        };

        let mut total_score = 0.0;
        for agent in &agents {
            let score = self.calculate_score(agent);
            total_score += score.overall;
            if score.overall >= 90.0 {
                overview.compliant_agents += 1;
            }
            *overview
                .bucket_counts
                .entry(level_key(score.level()).to_string())
                .or_insert(0) += 1;
            if let Some(status) = &agent.latest_status {
                overview.total_bytes_freed += status.freed_bytes;
                overview.total_cleanup_operations += status.cleanup_count;
            }
        }
        overview.average_score = if agents.is_empty() {
            0.0
        } else {
            total_score / agents.len() as f64
        };

        for distribution in self.distributor.history(usize::MAX) {
            *overview
                .policy_deployment_counts
                .entry(distribution.policy_name)
                .or_insert(0) += 1;
        }

        overview
    }

    pub fn agent_report(&self, agent_id: Uuid) -> FleetResult<AgentComplianceReport> {
        let agent = self
            .registry
            .lookup_by_id(agent_id)
            .ok_or(FleetError::AgentNotFound { id: agent_id })?;
        let score = self.calculate_score(&agent);
        let (total_bytes_freed, cleanup_count) = agent
            .latest_status
            .as_ref()
            .map(|s| (s.freed_bytes, s.cleanup_count))
            .unwrap_or((0, 0));

        Ok(AgentComplianceReport {
            agent_id,
            score,
            connection_state: connection_state_key(agent.connection_state).to_string(),
            health_status: agent
                .latest_status
                .as_ref()
                .map(|s| health_status_key(s.health_status).to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            total_bytes_freed,
            cleanup_count,
        })
    }

    pub fn policy_execution_report(&self, distribution_id: Uuid) -> FleetResult<PolicyExecutionReport> {
        let status = self
            .distributor
            .find(distribution_id)
            .ok_or(FleetError::DistributionNotFound { id: distribution_id })?;

        let agent_states = status
            .agent_statuses
            .iter()
            .map(|(id, s)| (*id, map_execution_state(s.state)))
            .collect();

        Ok(PolicyExecutionReport {
            distribution_id,
            policy_name: status.policy_name,
            policy_version: status.policy_version,
            agent_states,
        })
    }

    /// Pure over a caller-supplied slice: no component in this crate owns a
    /// combined audit buffer spanning access and agent events, so the host
    /// assembles the window it wants summarized.
    pub fn audit_log_summary(
        entries: &[AgentAuditEntry],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> FleetResult<AuditLogSummary> {
        if start > end {
            return Err(FleetError::InvalidDateRange);
        }

        let filtered: Vec<&AgentAuditEntry> = entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect();

        let mut summary = AuditLogSummary {
            total_entries: filtered.len(),
            ..Default::default()
        };

        let mut agent_counts: HashMap<Uuid, usize> = HashMap::new();
        let mut critical_entries: Vec<&AgentAuditEntry> = Vec::new();

        for entry in &filtered {
            *summary
                .by_severity
                .entry(severity_key(entry.severity).to_string())
                .or_insert(0) += 1;
            *summary
                .by_category
                .entry(format!("{:?}", entry.category).to_lowercase())
                .or_insert(0) += 1;
            if let Some(agent_id) = entry.agent_id {
                *agent_counts.entry(agent_id).or_insert(0) += 1;
            }
            if entry.severity == AuditSeverity::Critical {
                critical_entries.push(entry);
            }
        }

        let mut top_agents: Vec<(Uuid, usize)> = agent_counts.into_iter().collect();
        top_agents.sort_by(|a, b| b.1.cmp(&a.1));
        top_agents.truncate(10);
        summary.top_agents = top_agents;

        critical_entries.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        summary.latest_critical = critical_entries
            .into_iter()
            .take(20)
            .map(|e| e.message.clone())
            .collect();

        Ok(summary)
    }
}

fn map_execution_state(state: AgentDistributionState) -> PolicyExecutionState {
    match state {
        AgentDistributionState::Pending => PolicyExecutionState::Pending,
        AgentDistributionState::InProgress => PolicyExecutionState::Executing,
        AgentDistributionState::Completed => PolicyExecutionState::Completed,
        AgentDistributionState::Failed => PolicyExecutionState::Failed,
        AgentDistributionState::Cancelled => PolicyExecutionState::Skipped,
    }
}

fn level_key(level: ComplianceLevel) -> &'static str {
    match level {
        ComplianceLevel::Compliant => "compliant",
        ComplianceLevel::Partially => "partially",
        ComplianceLevel::NonCompliant => "non_compliant",
        ComplianceLevel::Critical => "critical",
    }
}

fn severity_key(severity: AuditSeverity) -> &'static str {
    match severity {
        AuditSeverity::Info => "info",
        AuditSeverity::Warning => "warning",
        AuditSeverity::Critical => "critical",
    }
}

fn connection_state_key(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Pending => "pending",
        ConnectionState::Active => "active",
        ConnectionState::Offline => "offline",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Rejected => "rejected",
    }
}

fn health_status_key(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Warning => "warning",
        HealthStatus::Critical => "critical",
        HealthStatus::Unknown => "unknown",
    }
}

/// Canonical JSON export: `serde_json`'s default map representation is
/// `BTreeMap`-backed, so keys come out sorted without extra work.
pub fn export_json<T: Serialize>(value: &T) -> FleetResult<String> {
    serde_json::to_string_pretty(value).map_err(|err| FleetError::ExportFailed {
        reason: err.to_string(),
    })
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn export_fleet_overview_csv(overview: &FleetOverview) -> String {
    let mut out = String::from(
        "total_agents,active_agents,average_score,compliant_agents,total_bytes_freed,total_cleanup_operations\n",
    );
    out.push_str(&format!(
        "{},{},{:.2},{},{},{}\n",
        overview.total_agents,
        overview.active_agents,
        overview.average_score,
        overview.compliant_agents,
        overview.total_bytes_freed,
        overview.total_cleanup_operations
    ));
    out
}

pub fn export_agent_reports_csv(reports: &[AgentComplianceReport]) -> String {
    let mut out = String::from(
        "agent_id,overall,policy_score,health_score,connectivity_score,connection_state,health_status,total_bytes_freed,cleanup_count\n",
    );
    for report in reports {
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2},{},{},{},{}\n",
            report.agent_id,
            report.score.overall,
            report.score.policy_score,
            report.score.health_score,
            report.score.connectivity_score,
            csv_escape(&report.connection_state),
            csv_escape(&report.health_status),
            report.total_bytes_freed,
            report.cleanup_count
        ));
    }
    out
}

pub fn export_audit_summary_csv(summary: &AuditLogSummary) -> String {
    let mut out = String::from("metric,value\n");
    out.push_str(&format!("total_entries,{}\n", summary.total_entries));
    for (key, value) in &summary.by_severity {
        out.push_str(&format!("severity_{},{}\n", csv_escape(key), value));
    }
    for (key, value) in &summary.by_category {
        out.push_str(&format!("category_{},{}\n", csv_escape(key), value));
    }
    for message in &summary.latest_critical {
        out.push_str(&format!("critical,{}\n", csv_escape(message)));
    }
    out
}
