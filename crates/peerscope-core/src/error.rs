//! Failure taxonomy shared by every external collaborator.

use std::fmt;

use thiserror::Error;

/// Terminal failure of a call to an external service.
///
/// `target` names the service (e.g. `"twitterapi"`, `"grok"`) so the caller
/// can tell which collaborator failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    #[error("{target} rate limit still in effect after {attempts} attempts")]
    RateLimited { target: String, attempts: u32 },

    #[error("{target} rejected the credentials (HTTP {status})")]
    Auth { target: String, status: u16 },

    #[error("{target}: {resource} not found")]
    NotFound { target: String, resource: String },

    #[error("{target} timed out after {attempts} attempts")]
    Timeout { target: String, attempts: u32 },

    #[error("network error talking to {target}: {message}")]
    Network { target: String, message: String },

    #[error("{target} returned HTTP {status}")]
    Server { target: String, status: u16 },

    #[error("malformed response ({reason}): {snippet}")]
    MalformedResponse { snippet: String, reason: String },

    #[error("response failed validation: {0}")]
    Validation(String),
}

/// Fieldless view of [`ExternalError`] for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    Auth,
    NotFound,
    Timeout,
    Network,
    Server,
    MalformedResponse,
    Validation,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Auth => "auth_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network_error",
            ErrorKind::Server => "server_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Validation => "validation_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExternalError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExternalError::RateLimited { .. } => ErrorKind::RateLimited,
            ExternalError::Auth { .. } => ErrorKind::Auth,
            ExternalError::NotFound { .. } => ErrorKind::NotFound,
            ExternalError::Timeout { .. } => ErrorKind::Timeout,
            ExternalError::Network { .. } => ErrorKind::Network,
            ExternalError::Server { .. } => ErrorKind::Server,
            ExternalError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ExternalError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Whether a bounded retry may clear the failure.
    ///
    /// Only rate limits and timeouts are retried by the HTTP layer. Network
    /// errors are retriable at the caller's discretion and are reported as
    /// such, but the HTTP layer surfaces them immediately.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ExternalError::RateLimited { .. }
                | ExternalError::Timeout { .. }
                | ExternalError::Network { .. }
        )
    }
}

impl From<crate::CoreError> for ExternalError {
    fn from(err: crate::CoreError) -> Self {
        ExternalError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_names() {
        let err = ExternalError::Auth {
            target: "grok".to_string(),
            status: 401,
        };
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.kind().to_string(), "auth_error");
    }

    #[test]
    fn only_transient_failures_are_retriable() {
        assert!(ExternalError::Timeout {
            target: "t".to_string(),
            attempts: 1
        }
        .is_retriable());
        assert!(!ExternalError::NotFound {
            target: "t".to_string(),
            resource: "user".to_string()
        }
        .is_retriable());
        assert!(!ExternalError::Validation("x".to_string()).is_retriable());
    }

    #[test]
    fn core_errors_become_validation_failures() {
        let err: ExternalError = crate::CoreError::EmptyInsights.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
