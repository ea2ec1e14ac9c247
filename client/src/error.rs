//! Error taxonomy for the client SDK
//!
//! Network and HTTP failures are normalized into [`ApiError`] values at the
//! gateway boundary and propagated unchanged; client-side validation
//! failures are detected before any network call. Session expiry is the one
//! condition with a side effect (the session-expired hook fires before the
//! error reaches the caller).

use thiserror::Error;

/// Normalized failure returned by every SDK operation
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, connect, timeout)
    #[error("Network error")]
    Network(#[source] reqwest::Error),

    /// Non-2xx response with a structured JSON body
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        errors: Vec<String>,
    },

    /// Non-2xx response without a JSON body; carries the raw text
    #[error("{message}")]
    HttpText { status: u16, message: String },

    /// The response body could not be parsed
    #[error("Failed to parse response")]
    Parse { status: u16 },

    /// The silent refresh after a 401 failed; the session has been cleared
    /// and the session-expired hook has already fired
    #[error("Session expired")]
    SessionExpired,

    /// Client-side validation rejected the request before any network call
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// HTTP status carried by the error, when one exists
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. }
            | ApiError::HttpText { status, .. }
            | ApiError::Parse { status } => Some(*status),
            _ => None,
        }
    }

    /// Structured error detail from the response body, when present
    pub fn errors(&self) -> &[String] {
        match self {
            ApiError::Http { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Whether this failure was detected before any network call
    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

/// Result alias used across the SDK
pub type ApiResult<T> = Result<T, ApiError>;
