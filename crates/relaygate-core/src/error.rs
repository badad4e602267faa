//! Shared error type across relaygate crates.

use thiserror::Error;

/// Coarse error classes (stable API).
///
/// Callers branch on the kind rather than on individual variants: framing
/// errors are recovered locally, delivery errors fall back to the offline
/// pipeline, resource exhaustion is reported at the connection boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed frame content.
    Framing,
    /// A bound was hit (frame size, pipeline capacity).
    ResourceExhausted,
    /// Recipient unreachable or write rejected.
    Delivery,
    /// Invalid configuration.
    Config,
    /// Internal invariant broken.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Framing => "FRAMING",
            ErrorKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::Delivery => "DELIVERY",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("framing: {0}")]
    Framing(String),
    #[error("{field} length {len} exceeds frame limit {max}")]
    FrameTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("recipient not connected: {0}")]
    NotConnected(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("offline pipeline full")]
    PipelineFull,
    #[error("offline pipeline closed")]
    PipelineClosed,
    #[error("offline consumer already attached")]
    ConsumerAttached,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map the error to its stable class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Framing(_) => ErrorKind::Framing,
            RelayError::FrameTooLarge { .. } => ErrorKind::ResourceExhausted,
            RelayError::NotConnected(_) => ErrorKind::Delivery,
            RelayError::Delivery(_) => ErrorKind::Delivery,
            RelayError::PipelineFull => ErrorKind::ResourceExhausted,
            RelayError::PipelineClosed => ErrorKind::ResourceExhausted,
            RelayError::ConsumerAttached => ErrorKind::Internal,
            RelayError::Config(_) => ErrorKind::Config,
            RelayError::UnsupportedVersion => ErrorKind::Config,
            RelayError::Internal(_) => ErrorKind::Internal,
        }
    }
}
