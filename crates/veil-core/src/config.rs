//! Sandbox configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use veil_audit::DEFAULT_CAPACITY;
use veil_consent::{PermissionKey, PermissionSet};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Path to the database file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,
    /// Maximum number of retained audit entries
    pub audit_capacity: usize,
    /// Values for permission keys a domain never configured
    pub global_defaults: PermissionSet,
    /// Key governing capabilities missing from the capability table
    pub fallback_permission: PermissionKey,
    /// Mirror audit entries to the database
    pub mirror_audit: bool,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: Some(data_dir.join("veil.db")),
            audit_capacity: DEFAULT_CAPACITY,
            global_defaults: PermissionSet::deny_all(),
            fallback_permission: PermissionKey::Cookies,
            mirror_audit: true,
        }
    }

    /// No durable storage at all.
    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            mirror_audit: false,
            ..Self::new(PathBuf::new())
        }
    }

    /// Parse a JSON document; missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.audit_capacity == 0 {
            return Err(CoreError::Config(
                "audit_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Veil"))
            .unwrap_or_else(|| PathBuf::from(".veil"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Simple dirs implementation for the platform data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/tmp/veil-test"));
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/veil-test/veil.db")));
        assert_eq!(config.audit_capacity, 10_000);
        assert_eq!(config.global_defaults, PermissionSet::deny_all());
        assert_eq!(config.fallback_permission, PermissionKey::Cookies);

        let memory = Config::in_memory();
        assert!(memory.database_path.is_none());
        assert!(!memory.mirror_audit);
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json(
            r#"{
                "databasePath": null,
                "auditCapacity": 3,
                "globalDefaults": { "allowPlugins": true },
                "fallbackPermission": "allowLocalStorage"
            }"#,
        )
        .unwrap();

        assert!(config.database_path.is_none());
        assert_eq!(config.audit_capacity, 3);
        assert!(config.global_defaults.get(PermissionKey::Plugins));
        assert!(!config.global_defaults.get(PermissionKey::Cookies));
        assert_eq!(config.fallback_permission, PermissionKey::LocalStorage);
        assert!(config.mirror_audit);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            Config::from_json(r#"{"auditCapacity": 0}"#),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            Config::from_json("not json"),
            Err(CoreError::Serialization(_))
        ));
    }
}
