//! Sandbox Context Manager
//!
//! Thin orchestration over the consent store: every change to a context is
//! written through as the domain's full permission set.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use veil_consent::{normalize_domain, ConsentStore, PermissionPatch};

use crate::context::{ContextStatus, SandboxContext};
use crate::error::ContextError;
use crate::Result;

pub struct ContextManager {
    /// Live contexts keyed by id
    contexts: Arc<RwLock<HashMap<String, SandboxContext>>>,
    consent: ConsentStore,
}

impl ContextManager {
    pub fn new(consent: ConsentStore) -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
            consent,
        }
    }

    /// Provision `domain` and return the new context id.
    ///
    /// The context starts from the consent defaults with `permissions` merged
    /// on top; the resulting full set replaces every key of the domain's
    /// consent record.
    pub fn create(&self, domain: &str, permissions: Option<&PermissionPatch>) -> String {
        let domain = normalize_domain(domain);
        let set = match permissions {
            Some(patch) => self.consent.defaults().merged(patch),
            None => self.consent.defaults().clone(),
        };

        let context = SandboxContext::new(domain, set);
        self.consent
            .set_permissions(&context.domain, &context.permissions.as_patch());

        tracing::info!(
            context_id = %context.id,
            domain = %context.domain,
            allowed = ?context.permissions.allowed(),
            "Created sandbox context"
        );

        let id = context.id.clone();
        self.contexts.write().insert(id.clone(), context);
        id
    }

    /// Remove the context. Consent already written for its domain stays.
    pub fn destroy(&self, id: &str) -> Result<SandboxContext> {
        let mut context = self
            .contexts
            .write()
            .remove(id)
            .ok_or_else(|| ContextError::NotFound(id.to_string()))?;
        context.status = ContextStatus::Destroyed;

        tracing::info!(context_id = %id, domain = %context.domain, "Destroyed sandbox context");

        Ok(context)
    }

    /// Merge `patch` into the context and write its full set to consent.
    pub fn update_permissions(&self, id: &str, patch: &PermissionPatch) -> Result<SandboxContext> {
        let mut contexts = self.contexts.write();
        let context = contexts
            .get_mut(id)
            .ok_or_else(|| ContextError::NotFound(id.to_string()))?;

        context.apply(patch);
        self.consent
            .set_permissions(&context.domain, &context.permissions.as_patch());

        tracing::debug!(
            context_id = %id,
            domain = %context.domain,
            updated_keys = patch.len(),
            "Updated sandbox context permissions"
        );

        Ok(context.clone())
    }

    pub fn get(&self, id: &str) -> Result<SandboxContext> {
        self.contexts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ContextError::NotFound(id.to_string()))
    }

    /// All live contexts, oldest first.
    pub fn list(&self) -> Vec<SandboxContext> {
        let mut contexts: Vec<SandboxContext> = self.contexts.read().values().cloned().collect();
        contexts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        contexts
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

impl Clone for ContextManager {
    fn clone(&self) -> Self {
        Self {
            contexts: Arc::clone(&self.contexts),
            consent: self.consent.clone(),
        }
    }
}
