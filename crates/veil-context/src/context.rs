//! Sandbox context data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veil_consent::{PermissionPatch, PermissionSet};

const ID_PREFIX: &str = "sandbox_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextStatus {
    Created,
    Destroyed,
}

impl ContextStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextStatus::Created => "created",
            ContextStatus::Destroyed => "destroyed",
        }
    }
}

impl std::fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxContext {
    /// Unique identifier, `sandbox_` followed by a random suffix
    pub id: String,
    /// Normalized domain this context provisions
    pub domain: String,
    pub created_at: DateTime<Utc>,
    /// Last permission change
    pub updated_at: DateTime<Utc>,
    /// Full set, written to the consent store on every change
    pub permissions: PermissionSet,
    pub status: ContextStatus,
}

impl SandboxContext {
    pub fn new(domain: String, permissions: PermissionSet) -> Self {
        let now = Utc::now();

        Self {
            id: format!("{}{}", ID_PREFIX, Uuid::new_v4().simple()),
            domain,
            created_at: now,
            updated_at: now,
            permissions,
            status: ContextStatus::Created,
        }
    }

    pub fn apply(&mut self, patch: &PermissionPatch) {
        self.permissions.apply(patch);
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == ContextStatus::Created
    }
}
