//! Consent store
//!
//! Holds the per-domain permission records. Records keep whatever keys were
//! written for a domain; reads merge them over the global defaults, so a
//! record never has holes from the caller's point of view.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use veil_storage::{Database, WriteQueue};

use crate::capability;
use crate::permissions::{PermissionKey, PermissionPatch, PermissionSet};

/// Settings key the consent document is persisted under.
pub const CONSENT_SETTING_KEY: &str = "consent_permissions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub permissions: PermissionPatch,
    pub granted_at: DateTime<Utc>,
}

pub struct ConsentStore {
    /// Stored records, keyed by domain
    records: Arc<RwLock<BTreeMap<String, ConsentRecord>>>,
    /// Values for keys a domain never configured
    defaults: PermissionSet,
    /// Key consulted for capabilities missing from the table
    fallback: PermissionKey,
    /// Durable mirror of `records`
    writer: Option<WriteQueue>,
}

impl ConsentStore {
    pub fn new(defaults: PermissionSet, fallback: PermissionKey) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            defaults,
            fallback,
            writer: None,
        }
    }

    /// Persist every future mutation through `writer`.
    pub fn with_writer(mut self, writer: WriteQueue) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Replace in-memory records with the persisted document.
    ///
    /// Unreadable or malformed state is not fatal: the store starts empty and
    /// a warning is logged.
    pub fn restore(&self, db: &Database) {
        let stored = db.get_json_setting::<BTreeMap<String, ConsentRecord>>(CONSENT_SETTING_KEY);
        let loaded = match stored {
            Ok(Some(records)) => records,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load stored permissions; starting empty");
                BTreeMap::new()
            }
        };

        tracing::info!(domains = loaded.len(), "Restored consent records");
        *self.records.write() = loaded;
    }

    pub fn defaults(&self) -> &PermissionSet {
        &self.defaults
    }

    pub fn fallback_key(&self) -> PermissionKey {
        self.fallback
    }

    /// Permission key governing `capability`.
    pub fn permission_key_for(&self, capability: &str) -> PermissionKey {
        capability::resolve(capability, self.fallback)
    }

    /// Full permission set for `domain`; global defaults if it has no record.
    pub fn get_permissions(&self, domain: &str) -> PermissionSet {
        match self.records.read().get(domain) {
            Some(record) => self.defaults.merged(&record.permissions),
            None => self.defaults.clone(),
        }
    }

    /// Merge `patch` over the domain's current set and persist the result.
    pub fn set_permissions(&self, domain: &str, patch: &PermissionPatch) -> PermissionSet {
        // Read, merge and write under one lock so concurrent partial updates
        // cannot drop each other's keys.
        let mut records = self.records.write();

        let mut merged = match records.get(domain) {
            Some(record) => self.defaults.merged(&record.permissions),
            None => self.defaults.clone(),
        };
        merged.apply(patch);

        records.insert(
            domain.to_string(),
            ConsentRecord {
                permissions: merged.as_patch(),
                granted_at: Utc::now(),
            },
        );
        self.persist(&records);

        tracing::info!(
            domain = %domain,
            updated_keys = patch.len(),
            allowed = ?merged.allowed(),
            "Updated domain permissions"
        );

        merged
    }

    /// Reset the domain to the global defaults (full replace).
    pub fn revoke_all(&self, domain: &str) -> PermissionSet {
        let mut records = self.records.write();

        records.insert(
            domain.to_string(),
            ConsentRecord {
                permissions: self.defaults.as_patch(),
                granted_at: Utc::now(),
            },
        );
        self.persist(&records);

        tracing::info!(domain = %domain, "Revoked all domain permissions");

        self.defaults.clone()
    }

    pub fn check_permission(&self, domain: &str, capability: &str) -> bool {
        let key = self.permission_key_for(capability);
        self.get_permissions(domain).get(key)
    }

    /// Allow the key governing `capability` for `domain`.
    pub fn grant_capability(&self, domain: &str, capability: &str) -> PermissionSet {
        let key = self.permission_key_for(capability);
        self.set_permissions(domain, &PermissionPatch::new().allow(key))
    }

    /// Deny the key governing `capability` for `domain`.
    pub fn revoke_capability(&self, domain: &str, capability: &str) -> PermissionSet {
        let key = self.permission_key_for(capability);
        self.set_permissions(domain, &PermissionPatch::new().deny(key))
    }

    pub fn granted_at(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.records.read().get(domain).map(|record| record.granted_at)
    }

    /// The domain's record with every key filled in; `None` if never configured.
    pub fn record(&self, domain: &str) -> Option<ConsentRecord> {
        self.records.read().get(domain).map(|record| ConsentRecord {
            permissions: self.defaults.merged(&record.permissions).as_patch(),
            granted_at: record.granted_at,
        })
    }

    /// Every configured domain with its full permission set.
    pub fn all_permissions(&self) -> BTreeMap<String, PermissionSet> {
        self.records
            .read()
            .iter()
            .map(|(domain, record)| (domain.clone(), self.defaults.merged(&record.permissions)))
            .collect()
    }

    fn persist(&self, records: &BTreeMap<String, ConsentRecord>) {
        let Some(writer) = &self.writer else {
            return;
        };

        match serde_json::to_string(records) {
            Ok(serialized) => writer.put_setting(CONSENT_SETTING_KEY, serialized),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize permissions"),
        }
    }
}

impl Default for ConsentStore {
    fn default() -> Self {
        Self::new(PermissionSet::deny_all(), PermissionKey::Cookies)
    }
}

impl Clone for ConsentStore {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            defaults: self.defaults.clone(),
            fallback: self.fallback,
            writer: self.writer.clone(),
        }
    }
}
