//! Error type shared by every layer of the fetch stack.

use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS or protocol failure reported by the transport.
    #[error("{0}")]
    Transport(#[source] BoxError),

    /// A single attempt exceeded its deadline.
    #[error("Request timed out after {} ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// The final attempt failed; wraps the last underlying error.
    #[error("Request failed after {attempts} retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    /// Malformed URL, credential, proxy or TLS configuration, detected
    /// before anything goes on the wire.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller cancelled the operation.
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        FetchError::Transport(error.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        FetchError::InvalidConfiguration(msg.into())
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_) | FetchError::Timeout { .. })
    }

    /// Walks `RetriesExhausted` wrappers down to the error of the last attempt.
    pub fn root_cause(&self) -> &FetchError {
        match self {
            FetchError::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout {
            timeout: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "Request timed out after 5000 ms");
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = FetchError::RetriesExhausted {
            attempts: 2,
            source: Box::new(FetchError::transport("Network error")),
        };
        assert_eq!(
            err.to_string(),
            "Request failed after 2 retries: Network error"
        );
    }

    #[test]
    fn test_retries_exhausted_exposes_source() {
        let err = FetchError::RetriesExhausted {
            attempts: 3,
            source: Box::new(FetchError::Timeout {
                timeout: Duration::from_secs(1),
            }),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("timed out"));
        assert!(matches!(err.root_cause(), FetchError::Timeout { .. }));
    }

    #[test]
    fn test_is_retryable() {
        assert!(FetchError::transport("connection reset").is_retryable());
        assert!(
            FetchError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!FetchError::invalid_configuration("bad proxy").is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }
}
