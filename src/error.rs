//! Error types for the tap
//!
//! Library code returns [`Result`] over [`TapError`]. The variants follow the
//! way a failure should be handled: configuration and authentication problems
//! are fatal immediately, transient network failures are retried by the client
//! before surfacing as [`TapError::RetriesExhausted`], and the pagination
//! variants act as circuit breakers against a misbehaving endpoint.

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, TapError>;

#[derive(Debug, thiserror::Error)]
pub enum TapError {
    /// Missing or malformed settings, detected at startup
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The API rejected our credentials (401/403)
    #[error("authentication failed (HTTP {status}): {body}")]
    Authentication { status: StatusCode, body: String },

    /// Any other non-retriable HTTP status
    #[error("HTTP {status} for {path}: {body}")]
    Http {
        status: StatusCode,
        path: String,
        body: String,
    },

    /// Connection errors, timeouts, 429 and 5xx responses that kept failing
    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The response body did not have the shape we expect
    #[error("malformed response from {path}: {reason}")]
    MalformedResponse { path: String, reason: String },

    #[error("pagination exceeded {max_pages} pages for {path}")]
    PaginationExhausted { path: String, max_pages: usize },

    #[error("pagination loop detected for {path}: token {token} was returned twice in a row")]
    PaginationLoop { path: String, token: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TapError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run should stop without trying anything else.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedResponse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_status() {
        let err = TapError::Authentication {
            status: StatusCode::UNAUTHORIZED,
            body: "bad credentials".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("bad credentials"));
    }

    #[test]
    fn test_malformed_is_not_fatal() {
        assert!(!TapError::malformed("/api/tickets", "missing data").is_fatal());
        assert!(TapError::Configuration("subdomain".into()).is_fatal());
    }
}
