//! Host capability endpoints
//!
//! The host binds its real operations (cookie jar, storage, canvas, peer
//! connections) to this interface; the mediator only ever talks to it.

use serde_json::Value;
use thiserror::Error;

/// How a capability is being used.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Property or value read
    Read,
    /// Property or value write
    Write(Value),
    /// Function call with arguments
    Call(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub access: Access,
    /// Host-supplied call-origin trace, one frame per line
    pub origin: Option<String>,
}

impl Invocation {
    pub fn read() -> Self {
        Self {
            access: Access::Read,
            origin: None,
        }
    }

    pub fn write(value: Value) -> Self {
        Self {
            access: Access::Write(value),
            origin: None,
        }
    }

    pub fn call(args: Vec<Value>) -> Self {
        Self {
            access: Access::Call(args),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn is_write(&self) -> bool {
        matches!(self.access, Access::Write(_))
    }
}

/// Failure raised by a real endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EndpointError {
    message: String,
}

impl EndpointError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub trait CapabilityEndpoint: Send + Sync {
    /// Dotted capability name, e.g. `canvas.toDataURL`
    fn capability(&self) -> &str;

    fn invoke(&self, invocation: &Invocation) -> Result<Value, EndpointError>;
}

/// Endpoint backed by a closure.
pub struct FnEndpoint<F> {
    capability: String,
    handler: F,
}

impl<F> FnEndpoint<F>
where
    F: Fn(&Invocation) -> Result<Value, EndpointError> + Send + Sync,
{
    pub fn new(capability: impl Into<String>, handler: F) -> Self {
        Self {
            capability: capability.into(),
            handler,
        }
    }
}

impl<F> CapabilityEndpoint for FnEndpoint<F>
where
    F: Fn(&Invocation) -> Result<Value, EndpointError> + Send + Sync,
{
    fn capability(&self) -> &str {
        &self.capability
    }

    fn invoke(&self, invocation: &Invocation) -> Result<Value, EndpointError> {
        (self.handler)(invocation)
    }
}
