//! Audit error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
