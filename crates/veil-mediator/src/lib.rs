//! Veil Capability Mediator
//!
//! Sits between a host capability endpoint and its caller:
//! - Resolves the requesting domain and the permission key of the capability
//! - Records one audit entry per request, before acting on the decision
//! - Blocked requests never reach the endpoint and get a safe substitute
//! - Failures of the real endpoint are audited and returned unchanged

mod endpoint;
mod error;
mod mediator;
mod sanitize;
mod substitute;

pub use endpoint::{Access, CapabilityEndpoint, EndpointError, FnEndpoint, Invocation};
pub use error::MediationError;
pub use mediator::{GuardedEndpoint, Mediator};
pub use sanitize::{sanitize_value, MAX_LOGGED_LEN};

pub type Result<T> = std::result::Result<T, MediationError>;
