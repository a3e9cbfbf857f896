//! Policy engine
//!
//! Global and per-domain policies live in one map; the global policy sits
//! under [`GLOBAL_POLICY_KEY`] and is always present.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use veil_audit::AuditEntry;
use veil_consent::normalize_domain;
use veil_storage::{Database, WriteQueue};

use crate::compliance::{self, Action, AuditReport, ComplianceResult};
use crate::rule::{Policy, PolicyRule};

/// Settings key the policy document is persisted under.
pub const POLICY_SETTING_KEY: &str = "compliance_policies";
pub const GLOBAL_POLICY_KEY: &str = "global";

pub struct PolicyEngine {
    policies: Arc<RwLock<BTreeMap<String, Policy>>>,
    writer: Option<WriteQueue>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(GLOBAL_POLICY_KEY.to_string(), Policy::global());

        Self {
            policies: Arc::new(RwLock::new(policies)),
            writer: None,
        }
    }

    pub fn with_writer(mut self, writer: WriteQueue) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Replace the in-memory policies with the persisted document.
    ///
    /// Malformed state resets to the built-in global policy with a warning.
    pub fn restore(&self, db: &Database) {
        let mut loaded = match db.get_json_setting::<BTreeMap<String, Policy>>(POLICY_SETTING_KEY) {
            Ok(Some(policies)) => policies,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load stored policies; using defaults");
                BTreeMap::new()
            }
        };
        loaded
            .entry(GLOBAL_POLICY_KEY.to_string())
            .or_insert_with(Policy::global);

        tracing::info!(policies = loaded.len(), "Restored compliance policies");
        *self.policies.write() = loaded;
    }

    pub fn global_policy(&self) -> Policy {
        self.policies
            .read()
            .get(GLOBAL_POLICY_KEY)
            .cloned()
            .unwrap_or_else(Policy::global)
    }

    /// The domain's own policy, if one was created.
    pub fn domain_policy(&self, domain: &str) -> Option<Policy> {
        let domain = normalize_domain(domain);
        if domain == GLOBAL_POLICY_KEY {
            return None;
        }
        self.policies.read().get(&domain).cloned()
    }

    /// Policy in force for `domain`: its own if present, else the global one.
    pub fn policy_for(&self, domain: &str) -> Policy {
        self.domain_policy(domain)
            .unwrap_or_else(|| self.global_policy())
    }

    /// Every domain with its own policy.
    pub fn domains(&self) -> Vec<String> {
        self.policies
            .read()
            .keys()
            .filter(|key| key.as_str() != GLOBAL_POLICY_KEY)
            .cloned()
            .collect()
    }

    /// Create (or replace) the domain's policy as the global rules followed by
    /// `custom_rules`.
    pub fn create_domain_policy(&self, domain: &str, custom_rules: Vec<PolicyRule>) -> Policy {
        let domain = normalize_domain(domain);
        let mut policies = self.policies.write();

        let global = policies
            .get(GLOBAL_POLICY_KEY)
            .cloned()
            .unwrap_or_else(Policy::global);
        let policy = global.extend_for(&domain, custom_rules);

        policies.insert(domain.clone(), policy.clone());
        self.persist(&policies);

        tracing::info!(domain = %domain, rules = policy.rules.len(), "Created domain policy");

        policy
    }

    /// Check a proposed action against the policy in force for `domain`.
    pub fn evaluate(&self, domain: &str, action: &Action) -> ComplianceResult {
        compliance::evaluate(&self.policy_for(domain), action)
    }

    /// Review recorded decisions for high-risk allowances.
    pub fn audit(&self, domain: &str, entries: &[AuditEntry]) -> AuditReport {
        let report = compliance::audit(domain, entries);
        tracing::debug!(
            domain = %domain,
            issues = report.total_issues,
            score = report.compliance_score,
            "Compliance audit"
        );
        report
    }

    fn persist(&self, policies: &BTreeMap<String, Policy>) {
        let Some(writer) = &self.writer else {
            return;
        };

        match serde_json::to_string(policies) {
            Ok(serialized) => writer.put_setting(POLICY_SETTING_KEY, serialized),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize policies"),
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PolicyEngine {
    fn clone(&self) -> Self {
        Self {
            policies: Arc::clone(&self.policies),
            writer: self.writer.clone(),
        }
    }
}
