//! Error types for the CMS Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the CMS Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more required fields were absent or empty
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Bearer credential absent, malformed, expired or badly signed
    #[error("{0}")]
    Unauthenticated(String),

    /// Credential is valid but does not carry the admin claim
    #[error("{0}")]
    Forbidden(String),

    /// Not found error
    #[error("{0}")]
    NotFound(String),

    /// Route exists but not for this method
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Third-party service failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The provider rejected our stored credential; re-authorization is required
    #[error("Upstream authorization error: {0}")]
    UpstreamAuth(String),

    /// An outbound call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Image upload failed
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::MissingFields(_) => 400,
            Error::Unauthenticated(_) | Error::Forbidden(_) => 401,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed => 405,
            _ => 500,
        }
    }

    /// Machine-readable category reported in the error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) | Error::MissingFields(_) => "validation_error",
            Error::Unauthenticated(_) => "unauthenticated",
            Error::Forbidden(_) => "forbidden",
            Error::NotFound(_) => "not_found",
            Error::MethodNotAllowed => "method_not_allowed",
            Error::Upstream(_) => "upstream_error",
            Error::UpstreamAuth(_) => "upstream_auth_error",
            Error::Timeout(_) => "timeout",
            Error::Upload(_) => "upload_error",
            Error::Database(_) | Error::Config(_) | Error::Serialization(_) | Error::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Message safe to show to API callers.
    ///
    /// Database and configuration failures are logged in full but reported generically.
    pub fn public_message(&self) -> String {
        match self {
            Error::Database(_) => "Database operation failed".to_string(),
            Error::Config(_) | Error::Internal(_) => "Server error".to_string(),
            Error::MissingFields(_) => "Missing required fields".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Upstream(e.to_string())
        }
    }
}
