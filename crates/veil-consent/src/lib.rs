//! Veil Consent
//!
//! Permissions Model:
//! - Every domain owns a full set of boolean permission keys
//! - Keys a domain never configured inherit the global defaults (deny by default)
//! - Partial updates merge over the current set; only "revoke all" replaces it
//! - Capability names map to exactly one key through a fixed table

mod capability;
mod domain;
mod permissions;
mod store;

pub use capability::{lookup, resolve, CAPABILITY_TABLE};
pub use domain::{normalize_domain, UNKNOWN_DOMAIN};
pub use permissions::{PermissionKey, PermissionPatch, PermissionSet};
pub use store::{ConsentRecord, ConsentStore, CONSENT_SETTING_KEY};
