//! Capability name → permission key table
//!
//! Resolution is an exact match against the table. A name that is not listed,
//! including a dotted child of a listed name, resolves to the caller's
//! fallback key.

use crate::permissions::PermissionKey;

pub const CAPABILITY_TABLE: &[(&str, PermissionKey)] = &[
    ("document.cookie", PermissionKey::Cookies),
    ("localStorage", PermissionKey::LocalStorage),
    ("localStorage.getItem", PermissionKey::LocalStorage),
    ("localStorage.setItem", PermissionKey::LocalStorage),
    ("localStorage.removeItem", PermissionKey::LocalStorage),
    ("localStorage.clear", PermissionKey::LocalStorage),
    ("sessionStorage", PermissionKey::LocalStorage),
    ("sessionStorage.getItem", PermissionKey::LocalStorage),
    ("sessionStorage.setItem", PermissionKey::LocalStorage),
    ("sessionStorage.removeItem", PermissionKey::LocalStorage),
    ("sessionStorage.clear", PermissionKey::LocalStorage),
    ("indexedDB", PermissionKey::IndexedDb),
    ("canvas", PermissionKey::Fingerprinting),
    ("canvas.toDataURL", PermissionKey::Fingerprinting),
    ("canvas.getImageData", PermissionKey::Fingerprinting),
    ("navigator.hardwareConcurrency", PermissionKey::Fingerprinting),
    ("navigator.deviceMemory", PermissionKey::Fingerprinting),
    ("screen", PermissionKey::Fingerprinting),
    ("screen.colorDepth", PermissionKey::Fingerprinting),
    ("webgl", PermissionKey::WebGl),
    ("HTMLCanvasElement.getContext", PermissionKey::WebGl),
    ("navigator.plugins", PermissionKey::Plugins),
    ("RTCPeerConnection", PermissionKey::WebRtc),
    ("ServiceWorker", PermissionKey::ServiceWorker),
];

/// Table entry for `capability`, if it is listed.
pub fn lookup(capability: &str) -> Option<PermissionKey> {
    CAPABILITY_TABLE
        .iter()
        .find(|(name, _)| *name == capability)
        .map(|(_, key)| *key)
}

pub fn resolve(capability: &str, fallback: PermissionKey) -> PermissionKey {
    lookup(capability).unwrap_or(fallback)
}
