//! Context error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Sandbox context not found: {0}")]
    NotFound(String),
}
