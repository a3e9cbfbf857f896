//! Audit entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use veil_storage::AuditRow;

/// Domain recorded when the caller could not supply one.
const UNKNOWN_DOMAIN: &str = "unknown";
/// Frames kept from a call-origin trace
const TRACE_FRAMES: usize = 3;
const TRACE_MAX_CHARS: usize = 300;
/// Serialized details larger than this are replaced by a marker
const DETAILS_MAX_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// Generic capability access
    Access,
    /// The real endpoint failed on the allowed path
    Error,
    CookieRead,
    CookieWrite,
    StorageRead,
    StorageWrite,
    FingerprintAttempt,
    WebrtcAccess,
}

impl EventType {
    /// Every type except `Error` records an access decision.
    pub fn is_access(&self) -> bool {
        !matches!(self, EventType::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Access => "access",
            EventType::Error => "error",
            EventType::CookieRead => "cookie-read",
            EventType::CookieWrite => "cookie-write",
            EventType::StorageRead => "storage-read",
            EventType::StorageWrite => "storage-write",
            EventType::FingerprintAttempt => "fingerprint-attempt",
            EventType::WebrtcAccess => "webrtc-access",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "access" => Ok(EventType::Access),
            "error" => Ok(EventType::Error),
            "cookie-read" => Ok(EventType::CookieRead),
            "cookie-write" => Ok(EventType::CookieWrite),
            "storage-read" => Ok(EventType::StorageRead),
            "storage-write" => Ok(EventType::StorageWrite),
            "fingerprint-attempt" => Ok(EventType::FingerprintAttempt),
            "webrtc-access" => Ok(EventType::WebrtcAccess),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Allowed,
    Blocked,
    Error,
}

impl AccessStatus {
    pub fn from_decision(allowed: bool) -> Self {
        if allowed {
            AccessStatus::Allowed
        } else {
            AccessStatus::Blocked
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Allowed => "allowed",
            AccessStatus::Blocked => "blocked",
            AccessStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allowed" => Ok(AccessStatus::Allowed),
            "blocked" => Ok(AccessStatus::Blocked),
            "error" => Ok(AccessStatus::Error),
            _ => Err(format!("Unknown access status: {}", s)),
        }
    }
}

/// What a caller asks the log to record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub event_type: EventType,
    pub domain: String,
    pub capability: String,
    pub status: AccessStatus,
    pub details: Value,
    pub trace: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        domain: impl Into<String>,
        capability: impl Into<String>,
        status: AccessStatus,
    ) -> Self {
        Self {
            event_type,
            domain: domain.into(),
            capability: capability.into(),
            status,
            details: Value::Object(Default::default()),
            trace: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_trace(mut self, trace: Option<String>) -> Self {
        self.trace = trace;
        self
    }
}

/// A recorded decision. Entries are handed out as copies; the log's own copy
/// is never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Position in the log's sequence; strictly increasing
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub domain: String,
    pub capability: String,
    pub status: AccessStatus,
    pub details: Value,
    pub trace: Option<String>,
}

impl AuditEntry {
    pub(crate) fn from_event(seq: u64, timestamp: DateTime<Utc>, event: AuditEvent) -> Self {
        let domain = if event.domain.trim().is_empty() {
            UNKNOWN_DOMAIN.to_string()
        } else {
            event.domain
        };

        Self {
            seq,
            timestamp,
            event_type: event.event_type,
            domain,
            capability: event.capability,
            status: event.status,
            details: bound_details(event.details),
            trace: event.trace.as_deref().and_then(truncate_trace),
        }
    }

    pub(crate) fn to_row(&self) -> AuditRow {
        AuditRow {
            seq: self.seq as i64,
            timestamp: AuditRow::format_timestamp(&self.timestamp),
            event_type: self.event_type.as_str().to_string(),
            domain: self.domain.clone(),
            capability: self.capability.clone(),
            status: self.status.as_str().to_string(),
            details: self.details.to_string(),
            trace: self.trace.clone(),
        }
    }
}

fn bound_details(details: Value) -> Value {
    if details.to_string().len() > DETAILS_MAX_CHARS {
        serde_json::json!({ "truncated": true })
    } else {
        details
    }
}

fn truncate_trace(trace: &str) -> Option<String> {
    let joined = trace
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(TRACE_FRAMES)
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        return None;
    }

    Some(joined.chars().take(TRACE_MAX_CHARS).collect())
}
