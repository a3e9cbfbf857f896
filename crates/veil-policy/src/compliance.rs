//! Action evaluation and audit review

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veil_audit::{AccessStatus, AuditEntry, EventType};
use veil_consent::{lookup, PermissionKey};

use crate::rule::{Policy, Regulation};

const DATA_SALE: &str = "dataSale";
const ISSUE_PENALTY: u32 = 5;
const FULL_SCORE: u32 = 100;

/// A proposed action described by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub requires_consent: bool,
    #[serde(default)]
    pub consent_given: bool,
    #[serde(default)]
    pub opt_out_allowed: bool,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Default::default()
        }
    }

    pub fn requires_consent(mut self, required: bool) -> Self {
        self.requires_consent = required;
        self
    }

    pub fn consent_given(mut self, given: bool) -> Self {
        self.consent_given = given;
        self
    }

    pub fn opt_out_allowed(mut self, allowed: bool) -> Self {
        self.opt_out_allowed = allowed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub compliant: bool,
    pub violations: Vec<String>,
    pub policy: Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceIssue {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub capability: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub domain: String,
    pub total_issues: usize,
    pub issues: Vec<ComplianceIssue>,
    /// `100 - 5 * total_issues`, floored at zero
    pub compliance_score: u32,
}

pub(crate) fn evaluate(policy: &Policy, action: &Action) -> ComplianceResult {
    let mut violations = Vec::new();

    for rule in policy.enabled_rules() {
        match &rule.regulation {
            Regulation::Gdpr if action.requires_consent && !action.consent_given => {
                violations.push(format!(
                    "GDPR: Explicit consent required for {}",
                    action.action_type
                ));
            }
            Regulation::Ccpa if action.action_type == DATA_SALE && !action.opt_out_allowed => {
                violations.push("CCPA: Users must be able to opt-out of data sales".to_string());
            }
            _ => {}
        }
    }

    ComplianceResult {
        compliant: violations.is_empty(),
        violations,
        policy: policy.clone(),
    }
}

pub(crate) fn audit(domain: &str, entries: &[AuditEntry]) -> AuditReport {
    let mut issues = Vec::new();

    for entry in entries.iter().filter(|e| e.status == AccessStatus::Allowed) {
        let name = entry.capability.to_lowercase();
        let key = lookup(&entry.capability);
        let fingerprinting = entry.event_type == EventType::FingerprintAttempt
            || key == Some(PermissionKey::Fingerprinting)
            || name.contains("fingerprint");
        let cookies = matches!(entry.event_type, EventType::CookieRead | EventType::CookieWrite)
            || key == Some(PermissionKey::Cookies)
            || name.contains("cookie");

        if fingerprinting {
            issues.push(ComplianceIssue {
                severity: Severity::High,
                message: format!("Fingerprinting allowed on {}", domain),
                timestamp: entry.timestamp,
                capability: entry.capability.clone(),
            });
        }
        if cookies {
            issues.push(ComplianceIssue {
                severity: Severity::Medium,
                message: format!("Cookies allowed on {}", domain),
                timestamp: entry.timestamp,
                capability: entry.capability.clone(),
            });
        }
    }

    let penalty = (issues.len() as u32).saturating_mul(ISSUE_PENALTY);

    AuditReport {
        domain: domain.to_string(),
        total_issues: issues.len(),
        compliance_score: FULL_SCORE.saturating_sub(penalty),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use veil_audit::{AuditEvent, AuditLog, EventType};

    use super::*;
    use crate::rule::PolicyRule;

    fn entries(records: &[(&str, AccessStatus)]) -> Vec<AuditEntry> {
        let log = AuditLog::new(100);
        for (capability, status) in records {
            log.record(AuditEvent::new(EventType::Access, "site.example", *capability, *status));
        }
        log.recent(100)
    }

    #[test]
    fn test_gdpr_violation() {
        let action = Action::new("analytics").requires_consent(true);
        let result = evaluate(&Policy::global(), &action);

        assert!(!result.compliant);
        assert_eq!(
            result.violations,
            vec!["GDPR: Explicit consent required for analytics".to_string()]
        );

        let consented = action.consent_given(true);
        assert!(evaluate(&Policy::global(), &consented).compliant);
    }

    #[test]
    fn test_ccpa_violation() {
        let sale = Action::new("dataSale");
        let result = evaluate(&Policy::global(), &sale);
        assert_eq!(
            result.violations,
            vec!["CCPA: Users must be able to opt-out of data sales".to_string()]
        );
        assert!(evaluate(&Policy::global(), &sale.opt_out_allowed(true)).compliant);

    }

    #[test]
    fn test_general_rule_adds_no_violations() {
        assert!(evaluate(&Policy::global(), &Action::new("cookies")).compliant);

        let tracking = Action::new("fingerprinting").requires_consent(true);
        let result = evaluate(&Policy::global(), &tracking);
        assert_eq!(
            result.violations,
            vec!["GDPR: Explicit consent required for fingerprinting".to_string()]
        );
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let mut policy = Policy::global();
        for rule in policy.rules.iter_mut() {
            rule.enabled = false;
        }
        policy.rules.push(PolicyRule::new("Custom", Regulation::Other("X".into()), "none"));

        let action = Action::new("dataSale").requires_consent(true);
        let result = evaluate(&policy, &action);
        assert!(result.compliant);
        assert!(result.violations.is_empty());
        assert_eq!(result.policy, policy);
    }

    #[test]
    fn test_audit_flags_allowed_risky_entries() {
        let log = entries(&[
            ("canvas.toDataURL", AccessStatus::Allowed),
            ("document.cookie", AccessStatus::Allowed),
            ("document.cookie", AccessStatus::Blocked),
            ("fingerprintjs.load", AccessStatus::Allowed),
            ("localStorage.getItem", AccessStatus::Allowed),
        ]);

        let report = audit("site.example", &log);
        assert_eq!(report.total_issues, 3);
        assert_eq!(report.compliance_score, 85);

        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium, Severity::High]);
        assert_eq!(report.issues[0].message, "Fingerprinting allowed on site.example");
        assert_eq!(report.issues[1].message, "Cookies allowed on site.example");
        assert_eq!(report.issues[0].timestamp, log[0].timestamp);
    }

    #[test]
    fn test_audit_uses_recorded_event_type() {
        let log = AuditLog::new(10);
        log.record(AuditEvent::new(
            EventType::FingerprintAttempt,
            "site.example",
            "screen.width",
            AccessStatus::Allowed,
        ));
        log.record(AuditEvent::new(
            EventType::CookieWrite,
            "site.example",
            "jar.write",
            AccessStatus::Allowed,
        ));
        log.record(AuditEvent::new(
            EventType::Access,
            "site.example",
            "screen.width",
            AccessStatus::Allowed,
        ));

        let report = audit("site.example", &log.recent(10));
        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium]);
        assert_eq!(report.issues[0].capability, "screen.width");
    }

    #[test]
    fn test_score_is_clamped_at_zero() {
        let risky: Vec<(&str, AccessStatus)> =
            (0..25).map(|_| ("document.cookie", AccessStatus::Allowed)).collect();
        let report = audit("site.example", &entries(&risky));

        assert_eq!(report.total_issues, 25);
        assert_eq!(report.compliance_score, 0);
    }

    #[test]
    fn test_report_serialization() {
        let report = audit("quiet.example", &[]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "domain": "quiet.example",
                "totalIssues": 0,
                "issues": [],
                "complianceScore": 100
            })
        );
    }
}
