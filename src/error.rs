//! # Error types for API calls
//!
//! Google APIs report failures as a JSON envelope:
//!
//! ```json
//! {"error": {"code": 404, "message": "...", "status": "NOT_FOUND",
//!            "errors": [{"reason": "notFound", "message": "..."}]}}
//! ```
//!
//! [`ApiError::from_response`] decodes that envelope so callers can branch on
//! the status code instead of string-matching response bodies.

use serde::Deserialize;

/// Error for a single HTTP API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status code.
    #[error("HTTPError {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Machine-readable reason from the first error detail
        /// (e.g. `notFound`, `rateLimitExceeded`), when the server sent one.
        reason: Option<String>,
    },

    /// The response body was not what the API documents.
    #[error("malformed response from server: {0}")]
    Malformed(String),

    /// The request did not complete at all.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorProto,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

impl ApiError {
    /// Builds an error from a response already known to be non-success.
    /// Falls back to the raw body when the envelope does not parse.
    pub async fn from_response(res: reqwest::Response) -> ApiError {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        ApiError::from_body(status, &body)
    }

    pub fn from_body(status: u16, body: &str) -> ApiError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ApiError::Http {
                status: envelope.error.code.unwrap_or(status),
                message: envelope.error.message,
                reason: envelope.error.errors.into_iter().find_map(|e| e.reason),
            },
            Err(_) => ApiError::Http {
                status,
                message: body.trim().to_string(),
                reason: None,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Malformed(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(409)
    }

    /// Whether retrying the same request may succeed: rate limiting,
    /// server-side errors, and transport timeouts qualify. Client errors
    /// other than 429 do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => *status == 429 || (500..=504).contains(status),
            ApiError::Transport(e) => e.is_timeout() || e.is_connect(),
            ApiError::Malformed(_) => false,
        }
    }

    /// A one-line remediation hint for errors the user can fix themselves.
    pub fn hint(&self) -> Option<&'static str> {
        match self.status() {
            Some(401) => Some(
                "Reauthenticate with `gcloud auth activate-service-account --key-file=KEY_FILE` \
                 or set GOOGLE_APPLICATION_CREDENTIALS.",
            ),
            Some(403) => Some(
                "Check that the active account has the required IAM role on the project, \
                 and that the API is enabled.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_envelope() {
        let body = r#"{"error": {"code": 404, "message": "The resource 'projects/p/zones/z/instances/vm' was not found", "errors": [{"message": "not found", "domain": "global", "reason": "notFound"}]}}"#;
        let err = ApiError::from_body(404, body);
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        match err {
            ApiError::Http {
                status,
                message,
                reason,
            } => {
                assert_eq!(status, 404);
                assert!(message.contains("was not found"));
                assert_eq!(reason.as_deref(), Some("notFound"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_raw_body() {
        let err = ApiError::from_body(502, "Bad Gateway");
        assert_eq!(err.status(), Some(502));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "HTTPError 502: Bad Gateway");
    }

    #[test]
    fn classifies_statuses() {
        assert!(ApiError::from_body(409, "{}").is_already_exists());
        assert!(ApiError::from_body(429, "{}").is_retryable());
        assert!(ApiError::from_body(503, "{}").is_retryable());
        assert!(!ApiError::from_body(400, "{}").is_retryable());
        assert!(ApiError::from_body(401, "{}").hint().is_some());
        assert!(ApiError::from_body(404, "{}").hint().is_none());
    }

    #[test]
    fn envelope_code_wins_over_transport_status() {
        let body = r#"{"error": {"code": 403, "message": "forbidden"}}"#;
        let err = ApiError::from_body(400, body);
        assert_eq!(err.status(), Some(403));
    }
}
