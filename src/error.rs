//! Error types for the SyntropyStack provider.
//!
//! [`ProviderError`] is what every provider operation returns and what the
//! protocol server turns into diagnostics. [`ApiError`] is produced by the
//! REST client and converted into a [`ProviderError`] at the resource boundary.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A configuration or state value failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider has not been configured or its configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or config value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The SyntropyStack API rejected or failed a request.
    #[error("SyntropyStack API error: {0}")]
    Api(String),

    /// Authentication or authorization failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The API is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A request to the API timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Remote state does not satisfy what the operation expects.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not supported for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Malformed request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::Api(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::Api(msg) => tonic::Status::unknown(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

/// Errors returned by [`crate::client::SyntropyClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status code.
    #[error("{status}: {body}")]
    Status {
        /// HTTP status returned by the API.
        status: StatusCode,
        /// Response body, usually a JSON error document.
        body: String,
    },

    /// A lookup that must match exactly one object matched some other number.
    #[error("expected {expected} {what} but got {actual}")]
    UnexpectedCount {
        /// What was looked up (e.g. "agent").
        what: &'static str,
        /// Number of objects the caller needed.
        expected: usize,
        /// Number of objects the API returned.
        actual: usize,
    },

    /// The API returned no object where one was required.
    #[error("{0}")]
    NotFound(String),
}

/// Result alias for client calls.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) if e.is_timeout() => ProviderError::DeadlineExceeded(e.to_string()),
            ApiError::Http(e) if e.is_connect() => ProviderError::Unavailable(e.to_string()),
            ApiError::Http(e) if e.is_decode() => {
                ProviderError::Api(format!("malformed API response: {}", e))
            },
            ApiError::Http(e) => ProviderError::Api(e.to_string()),
            ApiError::Status { status, body } => {
                let msg = format!("{}: {}", status, body);
                match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        ProviderError::PermissionDenied(msg)
                    },
                    StatusCode::NOT_FOUND => ProviderError::NotFound(msg),
                    StatusCode::TOO_MANY_REQUESTS => ProviderError::ResourceExhausted(msg),
                    s if s.is_server_error() => ProviderError::Unavailable(msg),
                    _ => ProviderError::Api(msg),
                }
            },
            err @ ApiError::UnexpectedCount { .. } => {
                ProviderError::FailedPrecondition(err.to_string())
            },
            ApiError::NotFound(msg) => ProviderError::NotFound(msg),
        }
    }
}
