//! Veil Storage Layer
//!
//! SQLite-backed persistence for consent records, compliance policies and the
//! audit mirror. Writes from the engine go through [`WriteQueue`], which never
//! blocks the caller; reads happen once at startup.

mod database;
mod error;
mod migrations;
mod writer;

pub use database::{AuditRow, Database};
pub use error::StorageError;
pub use writer::WriteQueue;

pub type Result<T> = std::result::Result<T, StorageError>;
