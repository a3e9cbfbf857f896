//! Veil Core
//!
//! Central coordination layer for the privacy sandbox.
//! Owns the consent store, audit log, policy engine and sandbox contexts, and
//! hands out mediators bound to them.

mod config;
mod error;
mod sandbox;
mod status;

pub use config::Config;
pub use error::CoreError;
pub use sandbox::PrivacySandbox;
pub use status::{format_block_rate, DashboardStatus, StatusSummary};

// Re-export core components
pub use veil_audit::{
    AccessStatus, AuditEntry, AuditError, AuditFilter, AuditLog, AuditStats, EventType,
    ExportFormat,
};
pub use veil_consent::{ConsentStore, PermissionKey, PermissionPatch, PermissionSet};
pub use veil_context::{ContextError, ContextStatus, SandboxContext};
pub use veil_mediator::{
    Access, CapabilityEndpoint, EndpointError, FnEndpoint, GuardedEndpoint, Invocation,
    MediationError, Mediator,
};
pub use veil_policy::{
    Action, AuditReport, ComplianceIssue, ComplianceResult, Policy, PolicyRule, Regulation,
    Severity,
};
pub use veil_storage::{AuditRow, Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
