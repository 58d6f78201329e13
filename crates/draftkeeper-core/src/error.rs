//! Error types for draftkeeper core
//!
//! Provides error handling for:
//! - Remote persistence failures (transport, rejection, decoding)
//! - Save failures surfaced to callers of `save()` / `publish()`
//! - Configuration loading and validation

use std::path::PathBuf;

/// Failure reported by a [`PersistenceClient`](crate::client::PersistenceClient)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// Request never produced a response (connection refused, timeout, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote store answered with a non-success status
    #[error("{message}")]
    Rejected {
        /// HTTP-style status code
        status: u16,
        /// Message from the response body, or a generic one
        message: String,
    },

    /// Response arrived but could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Failure injected by a simulated store
    #[error("{0}")]
    Injected(String),
}

impl PersistError {
    /// Create a rejection with the generic `API error: {status}` message
    #[inline]
    #[must_use]
    pub fn rejected(status: u16) -> Self {
        Self::Rejected {
            status,
            message: format!("API error: {status}"),
        }
    }

    /// Human-readable message suitable for the status bar
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::Injected(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if a later attempt could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Injected(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Failure returned from `save()` / `publish()`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    /// The remote store call failed; the working document is untouched
    #[error("save failed: {0}")]
    Persist(#[from] PersistError),

    /// The task running the request stopped before the store replied
    #[error("save interrupted before the store replied")]
    Interrupted,
}

impl SaveError {
    /// Message of the underlying failure
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Persist(e) => e.message(),
            Self::Interrupted => self.to_string(),
        }
    }

    /// Underlying persistence error, if the store was reached
    #[inline]
    #[must_use]
    pub fn persist_error(&self) -> Option<&PersistError> {
        match self {
            Self::Persist(e) => Some(e),
            Self::Interrupted => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`EditorConfig`](crate::config::EditorConfig)
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but violate a constraint
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_uses_generic_message() {
        let err = PersistError::rejected(404);
        assert_eq!(err.message(), "API error: 404");
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = PersistError::Rejected {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());
        assert!(PersistError::Transport("reset".into()).is_retryable());
        assert!(!PersistError::Decode("eof".into()).is_retryable());
    }

    #[test]
    fn save_error_passes_message_through() {
        let err = SaveError::from(PersistError::Injected("Network error".into()));
        assert_eq!(err.message(), "Network error");
        assert_eq!(err.to_string(), "save failed: Network error");
        assert!(err.persist_error().is_some());
    }

    #[test]
    fn interrupted_has_no_persist_error() {
        let err = SaveError::Interrupted;
        assert!(err.persist_error().is_none());
        assert_eq!(err.message(), "save interrupted before the store replied");
    }
}
