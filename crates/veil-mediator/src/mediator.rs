//! Per-invocation decision flow

use serde_json::{json, Value};
use veil_audit::{AccessStatus, AuditEvent, AuditLog, EventType};
use veil_consent::{normalize_domain, ConsentStore, PermissionKey};

use crate::endpoint::{Access, CapabilityEndpoint, Invocation};
use crate::error::MediationError;
use crate::sanitize;
use crate::substitute::{self, Substitute};
use crate::Result;

const STORAGE_MUTATORS: [&str; 3] = ["setItem", "removeItem", "clear"];

/// Mediates capability requests for one page domain.
pub struct Mediator {
    consent: ConsentStore,
    audit: AuditLog,
    domain: String,
}

impl Mediator {
    pub fn new(consent: ConsentStore, audit: AuditLog, domain: &str) -> Self {
        Self {
            consent,
            audit,
            domain: normalize_domain(domain),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn consent(&self) -> &ConsentStore {
        &self.consent
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Mediate a request made by the page this mediator serves.
    pub fn mediate<E>(&self, endpoint: &E, invocation: &Invocation) -> Result<Value>
    where
        E: CapabilityEndpoint + ?Sized,
    {
        self.decide(&self.domain, endpoint, invocation)
    }

    /// Mediate a request attributed to an explicit caller domain.
    pub fn mediate_for<E>(
        &self,
        domain: &str,
        endpoint: &E,
        invocation: &Invocation,
    ) -> Result<Value>
    where
        E: CapabilityEndpoint + ?Sized,
    {
        let domain = normalize_domain(domain);
        self.decide(&domain, endpoint, invocation)
    }

    pub fn wrap<E: CapabilityEndpoint>(&self, endpoint: E) -> GuardedEndpoint<E> {
        GuardedEndpoint {
            mediator: self.clone(),
            endpoint,
        }
    }

    fn decide<E>(&self, domain: &str, endpoint: &E, invocation: &Invocation) -> Result<Value>
    where
        E: CapabilityEndpoint + ?Sized,
    {
        let capability = endpoint.capability();
        let key = self.consent.permission_key_for(capability);
        let allowed = self.consent.check_permission(domain, capability);

        self.audit.record(
            AuditEvent::new(
                event_type_for(capability, key, invocation),
                domain,
                capability,
                AccessStatus::from_decision(allowed),
            )
            .with_details(sanitize::details_for(&invocation.access))
            .with_trace(invocation.origin.clone()),
        );

        if !allowed {
            tracing::warn!(
                domain = %domain,
                capability = %capability,
                permission = %key,
                "Capability blocked"
            );
            return match substitute::substitute_for(capability, key, invocation) {
                Substitute::Value(value) => Ok(value),
                Substitute::Refuse => Err(MediationError::Blocked {
                    capability: capability.to_string(),
                    domain: domain.to_string(),
                }),
            };
        }

        endpoint.invoke(invocation).map_err(|err| {
            tracing::debug!(
                domain = %domain,
                capability = %capability,
                error = %err,
                "Endpoint failed"
            );
            self.audit.record(
                AuditEvent::new(EventType::Error, domain, capability, AccessStatus::Error)
                    .with_details(json!({ "error": err.message() }))
                    .with_trace(invocation.origin.clone()),
            );
            MediationError::Upstream(err)
        })
    }
}

impl Clone for Mediator {
    fn clone(&self) -> Self {
        Self {
            consent: self.consent.clone(),
            audit: self.audit.clone(),
            domain: self.domain.clone(),
        }
    }
}

fn event_type_for(capability: &str, key: PermissionKey, invocation: &Invocation) -> EventType {
    let writes = match &invocation.access {
        Access::Write(_) => true,
        Access::Call(_) => capability
            .rsplit('.')
            .next()
            .map(|method| STORAGE_MUTATORS.contains(&method))
            .unwrap_or(false),
        Access::Read => false,
    };

    match key {
        PermissionKey::Cookies if writes => EventType::CookieWrite,
        PermissionKey::Cookies => EventType::CookieRead,
        PermissionKey::LocalStorage | PermissionKey::IndexedDb if writes => {
            EventType::StorageWrite
        }
        PermissionKey::LocalStorage | PermissionKey::IndexedDb => EventType::StorageRead,
        PermissionKey::Fingerprinting => EventType::FingerprintAttempt,
        PermissionKey::WebRtc => EventType::WebrtcAccess,
        _ => EventType::Access,
    }
}

/// An endpoint whose every invocation goes through a [`Mediator`].
pub struct GuardedEndpoint<E> {
    mediator: Mediator,
    endpoint: E,
}

impl<E: CapabilityEndpoint> GuardedEndpoint<E> {
    pub fn capability(&self) -> &str {
        self.endpoint.capability()
    }

    pub fn invoke(&self, invocation: &Invocation) -> Result<Value> {
        self.mediator.mediate(&self.endpoint, invocation)
    }

    pub fn read(&self) -> Result<Value> {
        self.invoke(&Invocation::read())
    }

    pub fn write(&self, value: Value) -> Result<Value> {
        self.invoke(&Invocation::write(value))
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        self.invoke(&Invocation::call(args))
    }

    pub fn into_inner(self) -> E {
        self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use veil_audit::AuditFilter;
    use veil_consent::{PermissionPatch, PermissionSet};

    use super::*;
    use crate::endpoint::{EndpointError, FnEndpoint};

    fn setup(domain: &str) -> Mediator {
        let consent = ConsentStore::new(PermissionSet::deny_all(), PermissionKey::Cookies);
        Mediator::new(consent, AuditLog::new(100), domain)
    }

    struct Counting {
        capability: String,
        result: Value,
        calls: Arc<AtomicUsize>,
    }

    impl CapabilityEndpoint for Counting {
        fn capability(&self) -> &str {
            &self.capability
        }

        fn invoke(&self, _: &Invocation) -> std::result::Result<Value, EndpointError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn counting(capability: &str, result: Value) -> (Counting, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint = Counting {
            capability: capability.to_string(),
            result,
            calls: calls.clone(),
        };
        (endpoint, calls)
    }

    #[test]
    fn test_blocked_never_reaches_endpoint() {
        let mediator = setup("https://tracker.example/page");
        let (endpoint, calls) = counting("document.cookie", json!("session=secret"));

        let value = mediator.mediate(&endpoint, &Invocation::read()).unwrap();
        assert_eq!(value, json!(""));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let written = mediator
            .mediate(&endpoint, &Invocation::write(json!("id=1")))
            .unwrap();
        assert_eq!(written, Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let entries = mediator.audit().query(&AuditFilter::new());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, EventType::CookieRead);
        assert_eq!(entries[1].event_type, EventType::CookieWrite);
        assert!(entries.iter().all(|e| e.status == AccessStatus::Blocked));
        assert!(entries.iter().all(|e| e.domain == "tracker.example"));
    }

    #[test]
    fn test_allowed_forwards_and_audits() {
        let mediator = setup("https://shop.example");
        mediator.consent().set_permissions(
            "shop.example",
            &PermissionPatch::new().allow(PermissionKey::LocalStorage),
        );
        let (endpoint, calls) = counting("localStorage.setItem", Value::Null);

        let args = vec![json!("cart"), json!({ "items": 3 })];
        mediator.mediate(&endpoint, &Invocation::call(args)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let entries = mediator.audit().query(&AuditFilter::new());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, EventType::StorageWrite);
        assert_eq!(entries[0].status, AccessStatus::Allowed);
        assert_eq!(entries[0].details, json!({ "args": ["cart", "[Object]"] }));
    }

    #[test]
    fn test_ads_example_scenario() {
        let mediator = setup("https://ads.example");
        mediator.consent().set_permissions(
            "ads.example",
            &PermissionPatch::new().allow(PermissionKey::Cookies),
        );

        let (cookie, cookie_calls) = counting("document.cookie", json!("uid=7"));
        let real = json!("data:image/png;base64,REAL");
        let (canvas, canvas_calls) = counting("canvas.toDataURL", real.clone());

        let cookie_value = mediator.mediate(&cookie, &Invocation::read()).unwrap();
        assert_eq!(cookie_value, json!("uid=7"));
        let first = mediator.mediate(&canvas, &Invocation::call(vec![])).unwrap();
        let second = mediator.mediate(&canvas, &Invocation::call(vec![])).unwrap();

        assert_eq!(cookie_calls.load(Ordering::SeqCst), 1);
        assert_eq!(canvas_calls.load(Ordering::SeqCst), 0);
        assert!(first.as_str().unwrap().starts_with("data:image/png;base64,"));
        assert_ne!(first, real);
        assert_ne!(first, second);

        let stats = mediator.audit().stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.blocked, 2);

        mediator.consent().set_permissions(
            "ads.example",
            &PermissionPatch::new().allow(PermissionKey::Fingerprinting),
        );
        let granted = mediator.mediate(&canvas, &Invocation::call(vec![])).unwrap();
        assert_eq!(granted, real);
        assert_eq!(canvas_calls.load(Ordering::SeqCst), 1);

        let entries = mediator.audit().query(&AuditFilter::new());
        assert_eq!(entries.len(), 4);
        let last = &entries[3];
        assert_eq!(last.status, AccessStatus::Allowed);
        assert_eq!(last.event_type, EventType::FingerprintAttempt);
        assert_eq!(last.capability, "canvas.toDataURL");
        assert_eq!(mediator.audit().stats().allowed, 2);
    }

    #[test]
    fn test_upstream_error_is_audited_and_returned() {
        let mediator = setup("https://broken.example");
        mediator.consent().set_permissions(
            "broken.example",
            &PermissionPatch::new().allow(PermissionKey::IndexedDb),
        );
        let endpoint = FnEndpoint::new("indexedDB", |_: &Invocation| {
            Err(EndpointError::new("quota exceeded"))
        });

        let err = mediator.mediate(&endpoint, &Invocation::read()).unwrap_err();
        assert_eq!(err, MediationError::Upstream(EndpointError::new("quota exceeded")));

        let entries = mediator.audit().query(&AuditFilter::new());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, AccessStatus::Allowed);
        assert_eq!(entries[1].event_type, EventType::Error);
        assert_eq!(entries[1].status, AccessStatus::Error);
        assert_eq!(entries[1].details, json!({ "error": "quota exceeded" }));
    }

    #[test]
    fn test_refused_capability_errors() {
        let mediator = setup("https://call.example");
        let (endpoint, calls) = counting("RTCPeerConnection", json!({}));

        let err = mediator.mediate(&endpoint, &Invocation::call(vec![])).unwrap_err();
        assert_eq!(
            err,
            MediationError::Blocked {
                capability: "RTCPeerConnection".to_string(),
                domain: "call.example".to_string(),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let entries = mediator.audit().query(&AuditFilter::new());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, EventType::WebrtcAccess);
    }

    #[test]
    fn test_unknown_capability_uses_fallback() {
        let mediator = setup("https://news.example");
        let (endpoint, calls) = counting("Notification.requestPermission", json!("granted"));

        let value = mediator.mediate(&endpoint, &Invocation::call(vec![])).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        mediator.consent().set_permissions(
            "news.example",
            &PermissionPatch::new().allow(PermissionKey::Cookies),
        );
        let value = mediator.mediate(&endpoint, &Invocation::call(vec![])).unwrap();
        assert_eq!(value, json!("granted"));
    }

    #[test]
    fn test_explicit_domain_and_trace() {
        let mediator = setup("");
        assert_eq!(mediator.domain(), "unknown");

        let (endpoint, _) = counting("navigator.plugins", json!(["pdf"]));
        let invocation = Invocation::read().with_origin("at frame (a.js:1)\nat main (b.js:2)");
        let value = mediator
            .mediate_for("https://Embed.Example/x", &endpoint, &invocation)
            .unwrap();
        assert_eq!(value, json!([]));

        let entries = mediator.audit().query(&AuditFilter::new().domain("embed.example"));
        assert_eq!(entries.len(), 1);
        let trace = entries[0].trace.as_deref();
        assert_eq!(trace, Some("at frame (a.js:1) at main (b.js:2)"));
    }

    #[test]
    fn test_wrapped_endpoint() {
        let mediator = setup("https://blog.example");
        let (endpoint, calls) = counting("localStorage.getItem", json!("dark"));
        let guarded = mediator.wrap(endpoint);

        assert_eq!(guarded.capability(), "localStorage.getItem");
        assert_eq!(guarded.call(vec![json!("theme")]).unwrap(), Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        mediator.consent().grant_capability("blog.example", "localStorage.getItem");
        assert_eq!(guarded.call(vec![json!("theme")]).unwrap(), json!("dark"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(mediator.audit().len(), 2);
    }
}
