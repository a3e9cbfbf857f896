//! Policy rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLICY_NAME: &str = "Default Privacy Policy";
pub const DEFAULT_POLICY_VERSION: &str = "1.0.0";

/// Regulation a rule derives from. Tags without a built-in predicate are
/// kept as-is and never flag a violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Regulation {
    Gdpr,
    Ccpa,
    General,
    Other(String),
}

impl Regulation {
    pub fn as_str(&self) -> &str {
        match self {
            Regulation::Gdpr => "GDPR",
            Regulation::Ccpa => "CCPA",
            Regulation::General => "General",
            Regulation::Other(tag) => tag,
        }
    }
}

impl From<String> for Regulation {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "GDPR" => Regulation::Gdpr,
            "CCPA" => Regulation::Ccpa,
            "General" => Regulation::General,
            _ => Regulation::Other(tag),
        }
    }
}

impl From<Regulation> for String {
    fn from(regulation: Regulation) -> Self {
        regulation.as_str().to_string()
    }
}

impl std::fmt::Display for Regulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub name: String,
    pub regulation: Regulation,
    pub requirement: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl PolicyRule {
    pub fn new(
        name: impl Into<String>,
        regulation: Regulation,
        requirement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            regulation,
            requirement: requirement.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// `None` for the global policy
    #[serde(default)]
    pub domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub rules: Vec<PolicyRule>,
}

impl Policy {
    /// The built-in global policy.
    pub fn global() -> Self {
        Self {
            name: DEFAULT_POLICY_NAME.to_string(),
            version: Some(DEFAULT_POLICY_VERSION.to_string()),
            domain: None,
            created_at: Utc::now(),
            rules: vec![
                PolicyRule::new(
                    "GDPR Compliance",
                    Regulation::Gdpr,
                    "Explicit consent required for any data processing",
                ),
                PolicyRule::new(
                    "CCPA Right to Opt-Out",
                    Regulation::Ccpa,
                    "Users must be able to opt-out of data sales",
                ),
                PolicyRule::new(
                    "No Tracking Without Consent",
                    Regulation::General,
                    "No cookies or fingerprinting without user permission",
                ),
            ],
        }
    }

    /// A domain policy: this policy's rules followed by `custom_rules`.
    pub fn extend_for(&self, domain: &str, custom_rules: Vec<PolicyRule>) -> Self {
        let mut rules = self.rules.clone();
        rules.extend(custom_rules);

        Self {
            name: format!("Policy for {}", domain),
            version: self.version.clone(),
            domain: Some(domain.to_string()),
            created_at: Utc::now(),
            rules,
        }
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter().filter(|rule| rule.enabled)
    }
}
