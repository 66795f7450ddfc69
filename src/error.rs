//! Error classification for client operations.
//!
//! All failures visible to the UI shell are `ApiError` values carrying a
//! kind, a one-line message, and optional raw details. Transport-level
//! kinds (`Network`, `Timeout`, `Unauthorized`, `HttpStatus`, `Parse`)
//! are produced by the request layer; the remaining kinds classify the
//! operation that failed so the shell can choose a presentation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of client errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Transport-level failure, no response received
    Network,
    /// Connection timeout or request timeout
    Timeout,
    /// HTTP 401 on an authenticated call
    Unauthorized,
    /// Any other non-2xx HTTP status
    HttpStatus,
    /// Failed to decode a response body
    Parse,
    /// Credential exchange rejected by the login endpoint
    Authentication,
    /// A client-side precondition failed before any request was made
    Validation,
    /// A read/list operation failed
    Load,
    /// A write operation failed; local state was left unchanged
    Mutation,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Unauthorized => write!(f, "unauthorized"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Authentication => write!(f, "authentication"),
            ApiErrorKind::Validation => write!(f, "validation"),
            ApiErrorKind::Load => write!(f, "load"),
            ApiErrorKind::Mutation => write!(f, "mutation"),
        }
    }
}

/// Structured client error with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a transport error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    /// Creates the error for a 401 on an authenticated call.
    pub fn unauthorized() -> Self {
        Self::new(ApiErrorKind::Unauthorized, "Session is no longer authorized")
    }

    /// Creates an HTTP status error, extracting a message from common
    /// JSON error body shapes when possible.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = match extract_error_message(body) {
            Some(msg) => format!("HTTP {}: {}", status, msg),
            None => format!("HTTP {}", status),
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            message,
            details: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
        }
    }

    /// Creates a response-decoding error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    /// Creates the error for a rejected credential exchange, keeping the
    /// upstream status and body for diagnostics.
    pub fn authentication(status: u16, body: &str) -> Self {
        let message = match extract_error_message(body) {
            Some(msg) => format!("Login failed (HTTP {}): {}", status, msg),
            None => format!("Login failed (HTTP {})", status),
        };
        Self {
            kind: ApiErrorKind::Authentication,
            message,
            details: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
        }
    }

    /// Creates a precondition error. No request was made.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, message)
    }

    /// Wraps a failed read operation.
    pub fn load(message: impl Into<String>, cause: ApiError) -> Self {
        Self::wrap(ApiErrorKind::Load, message, cause)
    }

    /// Wraps a failed write operation.
    pub fn mutation(message: impl Into<String>, cause: ApiError) -> Self {
        Self::wrap(ApiErrorKind::Mutation, message, cause)
    }

    fn wrap(kind: ApiErrorKind, message: impl Into<String>, cause: ApiError) -> Self {
        let details = match cause.details {
            Some(d) => format!("{}: {}", cause.message, d),
            None => cause.message,
        };
        Self {
            kind,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Returns true for the 401 kind, so callers can decide whether to
    /// redirect to a login prompt.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Pulls a human-readable message out of `{"error": {"message": ...}}`
/// or `{"message": ...}` bodies.
fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    if let Some(msg) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        return Some(msg.to_string());
    }
    json.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
