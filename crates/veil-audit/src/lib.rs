//! Veil Audit Log
//!
//! Every mediation decision becomes one immutable entry:
//! - Insertion-ordered, numbered by a monotonic sequence
//! - Bounded; the oldest entry is evicted first
//! - Never carries the user's network identity
//! - Optionally mirrored to SQLite, best effort

mod entry;
mod error;
mod export;
mod filter;
mod log;

pub use entry::{AccessStatus, AuditEntry, AuditEvent, EventType};
pub use error::AuditError;
pub use export::ExportFormat;
pub use filter::AuditFilter;
pub use log::{AuditLog, AuditStats, DEFAULT_CAPACITY};

pub type Result<T> = std::result::Result<T, AuditError>;
