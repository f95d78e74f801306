//! Error types for the Indico connector.
//!
//! Internal components return [`ConnectorError`], whose variants keep the
//! failure kind distinguishable. The facade is the only place where errors are
//! flattened into a [`HostError`] that carries nothing but the message text.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::JobId;

/// A specialized `Result` type for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors raised by connector components before they reach the host boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Missing, malformed or mutually exclusive arguments.
    #[error("{message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// The operation was invoked before the connector was initialized.
    #[error("{message}")]
    InvalidState {
        /// Description of the state problem.
        message: String,
    },

    // ========================================================================
    // Waiting Errors
    // ========================================================================
    /// The deadline elapsed before the resource became ready.
    #[error("Operation did not complete within {}ms", timeout.as_millis())]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// An externally supplied cancellation token fired.
    #[error("Operation was cancelled before it completed")]
    Cancelled,

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The remote service (or the transport in front of it) failed.
    #[error("{message}")]
    Remote {
        /// Description of the remote failure.
        message: String,
    },

    /// A review was accepted by the service but awaiting its job failed.
    ///
    /// Retrying the whole review would submit it twice; the job id lets the
    /// caller follow up on the existing job instead.
    #[error("Review was submitted as job '{job_id}' but its result could not be retrieved: {source}")]
    ReviewIncomplete {
        /// Identifier of the job created by the review submission.
        job_id: JobId,
        /// Why awaiting the job failed.
        #[source]
        source: Box<ConnectorError>,
    },

    // ========================================================================
    // Serialization and Configuration Errors
    // ========================================================================
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read or parsed.
    #[error("Invalid config file '{path}': {message}")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },
}

impl ConnectorError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidState` error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub const fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a new `Remote` error.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a new `ReviewIncomplete` error wrapping the awaiting failure.
    #[must_use]
    pub fn review_incomplete(job_id: JobId, source: Self) -> Self {
        Self::ReviewIncomplete {
            job_id,
            source: Box::new(source),
        }
    }

    /// Creates a new `ConfigParse` error.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for argument validation failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if the deadline elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if an external cancellation fired.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the remote service failed.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// The single error shape that crosses the host boundary.
///
/// The host can only display a message, so every [`ConnectorError`] kind is
/// reduced to its text here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ConnectorError> for HostError {
    fn from(err: ConnectorError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_bare() {
        let err = ConnectorError::validation("Must provide Changes or Reject=true");
        assert_eq!(err.to_string(), "Must provide Changes or Reject=true");
        assert!(err.is_validation());
        assert!(!err.is_remote());
    }

    #[test]
    fn test_timeout_display() {
        let err = ConnectorError::timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Operation did not complete within 60000ms");
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_review_incomplete_names_job() {
        let err = ConnectorError::review_incomplete(
            JobId::from("job-7"),
            ConnectorError::timeout(Duration::from_millis(500)),
        );
        let msg = err.to_string();
        assert!(msg.contains("job-7"));
        assert!(msg.contains("500ms"));
    }

    #[test]
    fn test_host_error_keeps_only_message() {
        let host: HostError = ConnectorError::remote("connection reset").into();
        assert_eq!(host.message(), "connection reset");
        assert_eq!(host.to_string(), "connection reset");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConnectorError = json_err.into();
        assert!(matches!(err, ConnectorError::Json(_)));
    }
}
