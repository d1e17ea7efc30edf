use std::time::Duration;
use thiserror::Error;

/// Failures reported by a remote index, classified once at the HTTP
/// boundary so callers can branch on the variant alone.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// Worth retrying: connect failures, timeouts, 429 and 5xx replies.
    #[error("transient remote failure: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
        /// Server-provided pacing hint, when the reply carried one.
        retry_after: Option<Duration>,
    },

    /// The request is broken and retrying will not help.
    #[error("permanent remote failure: {message}")]
    Permanent { status: Option<u16>, message: String },

    /// The credential was rejected. Retrying burns quota for nothing.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The reply did not match the documented shape.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The payload exceeds a remote limit and was never sent.
    #[error("payload of {size} bytes exceeds remote limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

impl RemoteError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Permanent {
            status,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// True for failures the caller may retry under a backoff policy.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// True when the run should stop instead of moving to the next item.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Pacing hint attached to a transient failure, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
