//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] veil_storage::StorageError),

    #[error("Audit error: {0}")]
    Audit(#[from] veil_audit::AuditError),

    #[error("Context error: {0}")]
    Context(#[from] veil_context::ContextError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
