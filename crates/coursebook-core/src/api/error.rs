use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Fallback text when a failed JSON call carries no usable `message`.
pub const REQUEST_FAILED: &str = "Request failed";

/// Fallback text when a failed upload carries no usable `message`.
pub const UPLOAD_FAILED: &str = "Upload failed";

/// Maximum length for error messages lifted from response bodies
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("{message}")]
    Request { status: StatusCode, message: String },

    #[error("Unauthorized - session could not be refreshed")]
    Unauthorized,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures below the HTTP layer: nothing came back to inspect.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

/// Why a refresh did not produce a new access credential. Never handed to
/// callers directly; every variant surfaces as [`ApiError::Unauthorized`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshFailure {
    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),

    #[error("refresh transport failure: {0}")]
    Network(String),

    #[error("refresh timed out")]
    TimedOut,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a message to avoid logging excessive data
    fn truncate_message(message: &str) -> String {
        let chars = message.chars().count();
        if chars <= MAX_ERROR_MESSAGE_LENGTH {
            message.to_string()
        } else {
            let cut: String = message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
            format!("{}... (truncated, {} total chars)", cut, chars)
        }
    }

    /// Build a `Request` error from a non-2xx response body. The backend sends
    /// `{"message": "..."}`; anything else falls back to `fallback`.
    pub fn from_status(status: StatusCode, body: &[u8], fallback: &str) -> Self {
        let message = serde_json::from_slice::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.message)
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self::truncate_message(&m))
            .unwrap_or_else(|| fallback.to_string());
        ApiError::Request { status, message }
    }

    /// HTTP status when the server answered, `None` for transport and local failures.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_envelope() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"message":"Title is required","status":400}"#,
            REQUEST_FAILED,
        );
        match err {
            ApiError::Request { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Title is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fallback_message() {
        // Not JSON at all
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>", REQUEST_FAILED);
        assert_eq!(err.to_string(), REQUEST_FAILED);

        // JSON without a message
        let err = ApiError::from_status(StatusCode::CONFLICT, br#"{"error":"conflict"}"#, UPLOAD_FAILED);
        assert_eq!(err.to_string(), UPLOAD_FAILED);

        // Empty message
        let err = ApiError::from_status(StatusCode::CONFLICT, br#"{"message":"  "}"#, REQUEST_FAILED);
        assert_eq!(err.to_string(), REQUEST_FAILED);
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "x".repeat(MAX_ERROR_MESSAGE_LENGTH + 20);
        let body = serde_json::json!({ "message": long }).to_string();
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, body.as_bytes(), REQUEST_FAILED);
        assert!(err.to_string().contains("truncated"));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_multibyte_message_within_limit_kept() {
        // Over the limit in bytes, within it in chars
        let message = "é".repeat(MAX_ERROR_MESSAGE_LENGTH);
        assert!(message.len() > MAX_ERROR_MESSAGE_LENGTH);
        assert_eq!(ApiError::truncate_message(&message), message);

        let longer = "é".repeat(MAX_ERROR_MESSAGE_LENGTH + 1);
        let cut = ApiError::truncate_message(&longer);
        assert!(cut.starts_with(&message));
        assert!(cut.ends_with(&format!("(truncated, {} total chars)", MAX_ERROR_MESSAGE_LENGTH + 1)));
    }
}
