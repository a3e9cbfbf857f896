//! Dashboard snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use veil_audit::AuditStats;
use veil_consent::PermissionSet;
use veil_context::SandboxContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total_requests: usize,
    pub blocked: usize,
    pub allowed: usize,
    pub errors: usize,
    /// Blocked share of all entries, e.g. `"66.67%"`
    pub block_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatus {
    pub summary: StatusSummary,
    pub by_domain: BTreeMap<String, usize>,
    pub by_capability: BTreeMap<String, usize>,
    pub permissions: BTreeMap<String, PermissionSet>,
    pub sandboxes: Vec<SandboxContext>,
}

impl DashboardStatus {
    pub(crate) fn build(
        stats: AuditStats,
        permissions: BTreeMap<String, PermissionSet>,
        sandboxes: Vec<SandboxContext>,
    ) -> Self {
        Self {
            summary: StatusSummary {
                total_requests: stats.total,
                blocked: stats.blocked,
                allowed: stats.allowed,
                errors: stats.errors,
                block_rate: format_block_rate(stats.blocked, stats.total),
            },
            by_domain: stats.by_domain,
            by_capability: stats.by_capability,
            permissions,
            sandboxes,
        }
    }
}

/// Percentage with two decimals; an empty log reads `"0.00%"`.
pub fn format_block_rate(blocked: usize, total: usize) -> String {
    if total == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", blocked as f64 * 100.0 / total as f64)
}
