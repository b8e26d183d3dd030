//! Custom error types for api-rest
//!
//! Every HTTP-derived failure keeps the status of the response that caused it,
//! so callers can still branch on the underlying transport error.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// A non-success response captured from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    /// Response status code
    pub status: StatusCode,
    /// Raw response body (may be empty)
    pub body: String,
}

impl HttpFailure {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{}: {}", self.status, self.body)
        }
    }
}

/// Main error type for api-rest
#[derive(Error, Debug)]
pub enum ApiRestError {
    /// An operation needed a session but none is held
    #[error("You are not logged in.\n\n  → Pass --token and --refresh-code, or set API_REST_TOKEN and API_REST_REFRESH_CODE.")]
    NotAuthenticated,

    /// 401 and no credential pair to refresh with
    #[error("Request was rejected as unauthenticated ({0}).\n\n  → Log in to obtain a token and refresh code.")]
    Unauthenticated(HttpFailure),

    /// 401, but the credentials were renewed while handling it
    #[error("Request was rejected ({0}) but the session has been refreshed.\n\n  → Send the request again.")]
    Refreshed(HttpFailure),

    /// 401 after the refresh window was already used up; the session was cleared
    #[error("Your session has expired ({0}).\n\n  → Log in again.")]
    SessionExpired(HttpFailure),

    /// The refresh endpoint rejected the refresh code; the session was cleared
    #[error("Session refresh was rejected with {refresh_status} (original failure: {original}).\n\n  → Log in again.")]
    RefreshFatal {
        /// The failure that triggered the refresh
        original: HttpFailure,
        /// Status returned by the refresh endpoint
        refresh_status: StatusCode,
    },

    /// The refresh call failed for a reason unrelated to the credentials
    #[error("Session refresh failed: {reason} (original failure: {original}).\n\n  → Check your connection and try again later.")]
    RefreshTransient {
        /// The failure that triggered the refresh
        original: HttpFailure,
        /// Why the refresh call failed
        reason: String,
    },

    /// Any other error status
    #[error("Request failed with {0}")]
    Http(HttpFailure),

    /// Network request error
    #[error("Network request failed: {0}\n\n  → Check your internet connection.")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// Base URL or target path could not be turned into a URL
    #[error("Invalid URL: {0}\n\n  → Check 'rest_api_url' with 'api-rest config show'.")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input from user
    #[error("{0}")]
    InvalidInput(String),
}

impl ApiRestError {
    /// Status of the transport response behind this error, if there was one
    ///
    /// For refresh failures this is the status of the original request, not of
    /// the refresh call.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiRestError::Unauthenticated(failure)
            | ApiRestError::Refreshed(failure)
            | ApiRestError::SessionExpired(failure)
            | ApiRestError::Http(failure)
            | ApiRestError::RefreshFatal {
                original: failure, ..
            }
            | ApiRestError::RefreshTransient {
                original: failure, ..
            } => Some(failure.status),
            ApiRestError::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Whether this error left the session logged out
    pub fn is_logout(&self) -> bool {
        matches!(
            self,
            ApiRestError::SessionExpired(_) | ApiRestError::RefreshFatal { .. }
        )
    }
}

impl From<toml::de::Error> for ApiRestError {
    fn from(err: toml::de::Error) -> Self {
        ApiRestError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for ApiRestError {
    fn from(err: toml::ser::Error) -> Self {
        ApiRestError::Toml(err.to_string())
    }
}

/// Result type alias using ApiRestError
pub type Result<T> = std::result::Result<T, ApiRestError>;
