pub mod access_controller;
pub mod distributor;
pub mod heartbeat;
pub mod policy;
pub mod registration;
pub mod registry;
pub mod reporter;

pub use access_controller::{AccessController, AccessGrant};
pub use distributor::PolicyDistributor;
pub use heartbeat::{HeartbeatMonitor, HeartbeatObserver, NoopObserver};
pub use policy::{default_policies, pattern_matches, AccessPolicy, HttpMethod};
pub use registration::{ApprovalPolicy, PendingRegistration, RegistrationService};
pub use registry::{AgentRegistry, RegistryStatistics};
pub use reporter::{
    export_agent_reports_csv, export_audit_summary_csv, export_fleet_overview_csv, export_json,
    ComplianceReporter,
};
