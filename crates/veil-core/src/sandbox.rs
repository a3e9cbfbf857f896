//! Main privacy sandbox state container
//!
//! All consent, audit, policy and context state flows through here. Hosts get
//! a [`Mediator`] per page domain and the dashboard reads snapshots.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use veil_audit::{AuditEntry, AuditFilter, AuditLog, AuditStats, ExportFormat};
use veil_consent::{normalize_domain, ConsentStore, PermissionPatch, PermissionSet};
use veil_context::{ContextManager, SandboxContext};
use veil_mediator::Mediator;
use veil_policy::{Action, AuditReport, ComplianceResult, Policy, PolicyEngine, PolicyRule};
use veil_storage::{AuditRow, Database, WriteQueue};

use crate::config::Config;
use crate::status::DashboardStatus;
use crate::Result;

/// Privacy sandbox instance
pub struct PrivacySandbox {
    config: Config,
    db: Database,
    /// Background persistence; `None` when storage could not be started
    writer: Option<WriteQueue>,
    consent: ConsentStore,
    audit: AuditLog,
    policy: PolicyEngine,
    contexts: ContextManager,
}

impl PrivacySandbox {
    /// Open storage, restore persisted consent and policies, and wire the
    /// components together.
    ///
    /// An unusable database file is not fatal: the sandbox falls back to an
    /// in-memory database and logs a warning.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = open_database(&config)?;
        let writer = match WriteQueue::spawn(db.clone()) {
            Ok(writer) => Some(writer),
            Err(e) => {
                tracing::warn!(error = %e, "Storage writer unavailable; changes will not persist");
                None
            }
        };

        let mut consent =
            ConsentStore::new(config.global_defaults.clone(), config.fallback_permission);
        let mut policy = PolicyEngine::new();
        let mut audit = AuditLog::new(config.audit_capacity);

        if let Some(writer) = &writer {
            consent = consent.with_writer(writer.clone());
            policy = policy.with_writer(writer.clone());
            if config.mirror_audit {
                audit = audit.with_mirror(writer.clone());
            }
        }

        consent.restore(&db);
        policy.restore(&db);

        let contexts = ContextManager::new(consent.clone());

        tracing::info!(
            persistent = config.database_path.is_some(),
            audit_capacity = audit.capacity(),
            mirror_audit = config.mirror_audit && writer.is_some(),
            "Privacy sandbox initialized"
        );

        Ok(Self {
            config,
            db,
            writer,
            consent,
            audit,
            policy,
            contexts,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Config::in_memory())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn consent(&self) -> &ConsentStore {
        &self.consent
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn policy_engine(&self) -> &PolicyEngine {
        &self.policy
    }

    /// A mediator for requests made by pages of `domain` (a host or origin URL).
    pub fn mediator(&self, domain: &str) -> Mediator {
        Mediator::new(self.consent.clone(), self.audit.clone(), domain)
    }

    // === Dashboard ===

    pub fn status(&self) -> DashboardStatus {
        DashboardStatus::build(
            self.audit.stats(),
            self.consent.all_permissions(),
            self.contexts.list(),
        )
    }

    pub fn logs(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.audit.query(filter)
    }

    pub fn stats(&self) -> AuditStats {
        self.audit.stats()
    }

    pub fn clear_logs(&self) {
        self.audit.clear();
    }

    pub fn export_logs(&self, format: ExportFormat) -> Result<String> {
        Ok(self.audit.export(format)?)
    }

    // === Consent ===

    pub fn permissions(&self, domain: &str) -> PermissionSet {
        self.consent.get_permissions(&normalize_domain(domain))
    }

    pub fn all_permissions(&self) -> BTreeMap<String, PermissionSet> {
        self.consent.all_permissions()
    }

    pub fn set_permissions(&self, domain: &str, patch: &PermissionPatch) -> PermissionSet {
        self.consent.set_permissions(&normalize_domain(domain), patch)
    }

    pub fn revoke_all_permissions(&self, domain: &str) -> PermissionSet {
        self.consent.revoke_all(&normalize_domain(domain))
    }

    // === Compliance ===

    /// Review the domain's retained log entries.
    pub fn audit_compliance(&self, domain: &str) -> AuditReport {
        let domain = normalize_domain(domain);
        let entries = self.audit.query(&AuditFilter::new().domain(domain.clone()));
        self.policy.audit(&domain, &entries)
    }

    pub fn evaluate_action(&self, domain: &str, action: &Action) -> ComplianceResult {
        self.policy.evaluate(domain, action)
    }

    pub fn create_domain_policy(&self, domain: &str, custom_rules: Vec<PolicyRule>) -> Policy {
        self.policy.create_domain_policy(domain, custom_rules)
    }

    // === Sandbox contexts ===

    pub fn create_sandbox(&self, domain: &str, permissions: Option<&PermissionPatch>) -> String {
        self.contexts.create(domain, permissions)
    }

    pub fn destroy_sandbox(&self, id: &str) -> Result<SandboxContext> {
        Ok(self.contexts.destroy(id)?)
    }

    pub fn update_sandbox_permissions(
        &self,
        id: &str,
        patch: &PermissionPatch,
    ) -> Result<SandboxContext> {
        Ok(self.contexts.update_permissions(id, patch)?)
    }

    pub fn sandbox(&self, id: &str) -> Result<SandboxContext> {
        Ok(self.contexts.get(id)?)
    }

    pub fn sandboxes(&self) -> Vec<SandboxContext> {
        self.contexts.list()
    }

    // === Durable audit mirror ===

    pub fn persisted_log_count(&self) -> Result<i64> {
        Ok(self.db.audit_row_count()?)
    }

    pub fn persisted_logs_for_domain(&self, domain: &str) -> Result<Vec<AuditRow>> {
        Ok(self.db.audit_rows_for_domain(&normalize_domain(domain))?)
    }

    pub fn persisted_logs_since(&self, since: &DateTime<Utc>) -> Result<Vec<AuditRow>> {
        Ok(self.db.audit_rows_since(since)?)
    }

    /// Wait until every queued write has reached the database.
    pub fn flush(&self) -> Result<()> {
        if let Some(writer) = &self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn is_storage_degraded(&self) -> bool {
        self.writer.as_ref().map_or(true, WriteQueue::is_degraded)
    }
}

impl Clone for PrivacySandbox {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            writer: self.writer.clone(),
            consent: self.consent.clone(),
            audit: self.audit.clone(),
            policy: self.policy.clone(),
            contexts: self.contexts.clone(),
        }
    }
}

fn open_database(config: &Config) -> Result<Database> {
    let Some(path) = &config.database_path else {
        return Ok(Database::open_in_memory()?);
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), error = %e, "Could not create data directory");
        }
    }

    match Database::open(path) {
        Ok(db) => Ok(db),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Database unavailable; continuing in memory"
            );
            Ok(Database::open_in_memory()?)
        }
    }
}
