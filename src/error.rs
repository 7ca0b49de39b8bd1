//! Unified error type for the dispatch core.
//!
//! Every terminal failure maps onto one of five externally meaningful kinds
//! (plus caller-initiated cancellation), so collaborators can branch on the
//! classification without parsing message text.

use thiserror::Error;

/// Classification of a terminal dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request violates a documented validation rule. Never retried.
    Validation,
    /// Required configuration is missing (e.g. no endpoints for a host).
    Configuration,
    /// Transient provider trouble that outlived the retry budget.
    TransientExhausted,
    /// The pool's circuit breaker is open; the call was not attempted.
    CircuitOpen,
    /// The provider rejected the request with a non-retryable status.
    Provider,
    /// The caller cancelled the dispatch.
    Cancelled,
}

/// Error type for the dispatch core.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation rule violation, reported verbatim to the caller.
    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("circuit open for pool '{pool}'; retry in {retry_in_ms}ms")]
    CircuitOpen { pool: String, retry_in_ms: u64 },

    #[error("provider call failed after {attempts} attempt(s): {message}")]
    TransientExhausted { attempts: u32, message: String },

    #[error("provider rejected the request (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("dispatch cancelled by caller")]
    Cancelled,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Validation(_) => FailureKind::Validation,
            Error::Configuration(_) => FailureKind::Configuration,
            Error::CircuitOpen { .. } => FailureKind::CircuitOpen,
            Error::TransientExhausted { .. } => FailureKind::TransientExhausted,
            Error::Provider { .. } => FailureKind::Provider,
            Error::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether the same request could succeed later without modification.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::TransientExhausted | FailureKind::CircuitOpen | FailureKind::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::validation("bad").kind(), FailureKind::Validation);
        assert_eq!(
            Error::configuration("missing").kind(),
            FailureKind::Configuration
        );
        assert_eq!(
            Error::CircuitOpen {
                pool: "openai".into(),
                retry_in_ms: 100
            }
            .kind(),
            FailureKind::CircuitOpen
        );
        assert_eq!(
            Error::TransientExhausted {
                attempts: 4,
                message: "HTTP 503".into()
            }
            .kind(),
            FailureKind::TransientExhausted
        );
        assert_eq!(
            Error::Provider {
                status: 404,
                message: "not found".into()
            }
            .kind(),
            FailureKind::Provider
        );
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::validation("Temperature must be a value between 0 and 2.");
        assert_eq!(
            err.to_string(),
            "Temperature must be a value between 0 and 2."
        );
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(Error::TransientExhausted {
            attempts: 1,
            message: "timeout".into()
        }
        .is_recoverable());
        assert!(!Error::validation("bad").is_recoverable());
        assert!(!Error::Provider {
            status: 400,
            message: "bad request".into()
        }
        .is_recoverable());
    }
}
