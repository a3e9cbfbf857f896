//! Veil Compliance Policies
//!
//! - One global policy plus optional per-domain policies extending it
//! - `evaluate` checks a proposed action against the enabled rules
//! - `audit` reviews recorded decisions for high-risk allowances

mod compliance;
mod engine;
mod rule;

pub use compliance::{Action, AuditReport, ComplianceIssue, ComplianceResult, Severity};
pub use engine::{PolicyEngine, GLOBAL_POLICY_KEY, POLICY_SETTING_KEY};
pub use rule::{Policy, PolicyRule, Regulation};
