//! Mediation error types

use thiserror::Error;

use crate::endpoint::EndpointError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediationError {
    /// Denied capability with no safe substitute (peer connections, workers)
    #[error("{capability} blocked by privacy sandbox for {domain}")]
    Blocked { capability: String, domain: String },

    /// The real endpoint failed on the allowed path
    #[error(transparent)]
    Upstream(#[from] EndpointError),
}
