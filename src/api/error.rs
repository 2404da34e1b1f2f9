//! API error types for the Jira gateway.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the Jira REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials are missing or malformed.
    ///
    /// Only raised while constructing a client, never at request time.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The caller supplied a request that cannot be sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service kept answering 429 until the retry budget ran out.
    #[error("Rate limit exceeded after retries: status_code={status}, body={body}")]
    RateLimited {
        /// The final status code.
        status: StatusCode,
        /// The body of the last 429 response.
        body: String,
    },

    /// The service answered with a status the gateway does not accept.
    #[error("Jira API error: status_code={status}, body={body}")]
    Http {
        /// The response status code.
        status: StatusCode,
        /// The raw response body.
        body: String,
    },

    /// Network or transport-level failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response whose body could not be decoded.
    #[error("Invalid API response: {0}")]
    Decode(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credentials.
    Authentication,
    /// Malformed caller input, detected before any I/O.
    InvalidRequest,
    /// Retry budget exhausted under sustained rate limiting.
    RateLimit,
    /// Any other HTTP, transport or decoding failure.
    Request,
}

impl ApiError {
    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Authentication(_) => ErrorKind::Authentication,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::RateLimited { .. } => ErrorKind::RateLimit,
            ApiError::Http { .. } | ApiError::Network(_) | ApiError::Decode(_) => {
                ErrorKind::Request
            }
        }
    }

    /// The HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RateLimited { status, .. } | ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(err) => err.status(),
            _ => None,
        }
    }

    /// The raw response body attached to this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::RateLimited { body, .. } | ApiError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Extract Jira's human-readable messages from an error body.
    ///
    /// Jira answers failures with `{"errorMessages": [...], "errors": {...}}`.
    /// Returns `None` when the body carries neither.
    pub fn jira_messages(&self) -> Option<String> {
        let body = self.body()?;
        let json = serde_json::from_str::<serde_json::Value>(body).ok()?;

        let mut messages: Vec<String> = json
            .get("errorMessages")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(errors) = json.get("errors").and_then(|e| e.as_object()) {
            messages.extend(errors.iter().map(|(k, v)| match v.as_str() {
                Some(text) => format!("{}: {}", k, text),
                None => format!("{}: {}", k, v),
            }));
        }

        if messages.is_empty() {
            None
        } else {
            Some(messages.join(", "))
        }
    }
}
