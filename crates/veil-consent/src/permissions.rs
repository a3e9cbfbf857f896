//! Permission keys and permission sets
//!
//! | Key                   | Governs                                  |
//! | allowCookies          | cookie reads and writes                  |
//! | allowLocalStorage     | local/session storage                    |
//! | allowIndexedDB        | IndexedDB                                |
//! | allowFingerprinting   | canvas, hardware and screen surfaces     |
//! | allowWebGL            | WebGL contexts                           |
//! | allowServiceWorker    | service worker registration              |
//! | allowWebRTC           | peer connections                         |
//! | allowPlugins          | plugin enumeration                       |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionKey {
    #[serde(rename = "allowCookies")]
    Cookies,
    #[serde(rename = "allowLocalStorage")]
    LocalStorage,
    #[serde(rename = "allowIndexedDB")]
    IndexedDb,
    #[serde(rename = "allowFingerprinting")]
    Fingerprinting,
    #[serde(rename = "allowWebGL")]
    WebGl,
    #[serde(rename = "allowServiceWorker")]
    ServiceWorker,
    #[serde(rename = "allowWebRTC")]
    WebRtc,
    #[serde(rename = "allowPlugins")]
    Plugins,
}

impl PermissionKey {
    pub const ALL: [PermissionKey; 8] = [
        PermissionKey::Cookies,
        PermissionKey::LocalStorage,
        PermissionKey::IndexedDb,
        PermissionKey::Fingerprinting,
        PermissionKey::WebGl,
        PermissionKey::ServiceWorker,
        PermissionKey::WebRtc,
        PermissionKey::Plugins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKey::Cookies => "allowCookies",
            PermissionKey::LocalStorage => "allowLocalStorage",
            PermissionKey::IndexedDb => "allowIndexedDB",
            PermissionKey::Fingerprinting => "allowFingerprinting",
            PermissionKey::WebGl => "allowWebGL",
            PermissionKey::ServiceWorker => "allowServiceWorker",
            PermissionKey::WebRtc => "allowWebRTC",
            PermissionKey::Plugins => "allowPlugins",
        }
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PermissionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown permission key: {}", s))
    }
}

/// A partial update: only the keys present are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionPatch(BTreeMap<PermissionKey, bool>);

impl PermissionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(self, key: PermissionKey) -> Self {
        self.with(key, true)
    }

    pub fn deny(self, key: PermissionKey) -> Self {
        self.with(key, false)
    }

    pub fn with(mut self, key: PermissionKey, value: bool) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn get(&self, key: PermissionKey) -> Option<bool> {
        self.0.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PermissionKey, bool)> + '_ {
        self.0.iter().map(|(key, value)| (*key, *value))
    }
}

impl FromIterator<(PermissionKey, bool)> for PermissionPatch {
    fn from_iter<I: IntoIterator<Item = (PermissionKey, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A complete permission set. Always holds a value for every [`PermissionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionPatch", into = "PermissionPatch")]
pub struct PermissionSet(BTreeMap<PermissionKey, bool>);

impl PermissionSet {
    pub fn uniform(value: bool) -> Self {
        Self(PermissionKey::ALL.iter().map(|key| (*key, value)).collect())
    }

    pub fn deny_all() -> Self {
        Self::uniform(false)
    }

    pub fn get(&self, key: PermissionKey) -> bool {
        self.0.get(&key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: PermissionKey, value: bool) {
        self.0.insert(key, value);
    }

    /// Overwrite the keys present in `patch`, keep the rest.
    pub fn apply(&mut self, patch: &PermissionPatch) {
        for (key, value) in patch.iter() {
            self.0.insert(key, value);
        }
    }

    pub fn merged(&self, patch: &PermissionPatch) -> Self {
        let mut merged = self.clone();
        merged.apply(patch);
        merged
    }

    pub fn as_patch(&self) -> PermissionPatch {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PermissionKey, bool)> + '_ {
        self.0.iter().map(|(key, value)| (*key, *value))
    }

    pub fn allowed(&self) -> Vec<PermissionKey> {
        self.iter()
            .filter(|(_, allowed)| *allowed)
            .map(|(key, _)| key)
            .collect()
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::deny_all()
    }
}

// Keys missing from a deserialized set are denied
impl From<PermissionPatch> for PermissionSet {
    fn from(patch: PermissionPatch) -> Self {
        PermissionSet::deny_all().merged(&patch)
    }
}

impl From<PermissionSet> for PermissionPatch {
    fn from(set: PermissionSet) -> Self {
        set.as_patch()
    }
}
