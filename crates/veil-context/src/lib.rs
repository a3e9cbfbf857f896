//! Veil Sandbox Contexts
//!
//! - A context provisions one domain with a full permission set
//! - Creating or updating a context writes its set to the consent store
//! - Destroying a context leaves the domain's consent untouched
//! - Consent changed directly on the store does not flow back into contexts

mod context;
mod error;
mod manager;

pub use context::{ContextStatus, SandboxContext};
pub use error::ContextError;
pub use manager::ContextManager;

pub type Result<T> = std::result::Result<T, ContextError>;
