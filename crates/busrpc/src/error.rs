//! # Error Definitions
//!
//! Every failure a caller of this crate can observe, from setup mistakes to
//! faults thrown by a remote implementation.

use buspack::Fault;
use buspack::Throwable;

use crate::contract::ReturnShape;
use crate::transport::FAILURE_INTERNAL;
use crate::transport::FAILURE_METHOD_NOT_FOUND;
use crate::transport::TransportError;

#[derive(Debug, Clone)]
pub enum Error {
    /// Contract metadata is missing or inconsistent. Raised at setup time.
    Configuration(String),
    /// The method's declared return shape is neither "no value" nor "eventual value".
    Unsupported { method: String, returns: String },
    /// The stub's contract does not declare this method.
    UndeclaredMethod { address: String, method: String },
    /// The argument tuple does not match the declared parameter count.
    ArityMismatch { method: String, expected: usize, found: usize },
    /// `call` used on a one-way method, or `notify` on an eventual one.
    ShapeMismatch { method: String, declared: ReturnShape },
    /// The remote dispatcher has no such method.
    MethodNotFound(String),
    /// The remote implementation failed.
    Remote(Fault),
    /// Delivery failed before the remote implementation could answer.
    Transport(TransportError),
    /// The remote dispatcher failed outside the implementation.
    Dispatch(String),
    /// Local encode or decode failure.
    Codec(buspack::Error),
    /// The completer was dropped without completing.
    Abandoned,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Self::Unsupported { method, returns } => {
                write!(f, "Method {} returns {}; only () and Eventual returns are supported", method, returns)
            }
            Self::UndeclaredMethod { address, method } => {
                write!(f, "Contract at {} declares no method {}", address, method)
            }
            Self::ArityMismatch { method, expected, found } => {
                write!(f, "Method {} takes {} arguments, got {}", method, expected, found)
            }
            Self::ShapeMismatch { method, declared } => {
                write!(f, "Method {} is declared {:?}", method, declared)
            }
            Self::MethodNotFound(msg) => write!(f, "{}", msg),
            Self::Remote(fault) => write!(f, "Remote failure: {}", fault),
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Dispatch(msg) => write!(f, "Dispatch failure: {}", msg),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::Abandoned => write!(f, "Call abandoned without a result"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Remote(fault) => Some(fault),
            Self::Transport(e) => Some(e),
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<buspack::Error> for Error {
    fn from(e: buspack::Error) -> Self {
        Self::Codec(e)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Remote(fault)
    }
}

/// Recipient failures with a reserved code become their own variants.
impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Recipient { code: FAILURE_METHOD_NOT_FOUND, message } => Self::MethodNotFound(message),
            TransportError::Recipient { code: FAILURE_INTERNAL, message } => Self::Dispatch(message),
            other => Self::Transport(other),
        }
    }
}

impl Error {
    /// Wraps a domain error so it travels to the caller as a fault.
    pub fn thrown<T: Throwable>(error: &T) -> Self {
        Self::Remote(error.to_fault())
    }

    /// Rebuilds the domain error behind a remote failure, if it is a `T`.
    pub fn remote<T: Throwable>(&self) -> Option<T> {
        match self {
            Self::Remote(fault) => fault.downcast::<T>(),
            _ => None,
        }
    }

    /// The fault sent back to a caller when a call fails with this error.
    pub fn to_fault(&self) -> Fault {
        match self {
            Self::Remote(fault) => fault.clone(),
            other => Fault::new(other.kind(), other.to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration",
            Self::Unsupported { .. } => "Unsupported",
            Self::UndeclaredMethod { .. } => "UndeclaredMethod",
            Self::ArityMismatch { .. } => "ArityMismatch",
            Self::ShapeMismatch { .. } => "ShapeMismatch",
            Self::MethodNotFound(_) => "MethodNotFound",
            Self::Remote(_) => "Remote",
            Self::Transport(_) => "Transport",
            Self::Dispatch(_) => "Dispatch",
            Self::Codec(_) => "Codec",
            Self::Abandoned => "Abandoned",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
