use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// Failure taxonomy shared by every FanFou tool.
///
/// Tool adapters never let these escape to the transport: they are converted
/// into a JSON value with a single `error` field (or, for
/// [`FanfouError::ConfirmationRequired`], into the confirmation prompt).
#[derive(Debug, Clone, Error)]
pub enum FanfouError {
    /// Key material or tokens absent from the credential source.
    #[error("missing credentials: {}. {hint}", .missing.join(", "))]
    MissingCredentials { missing: Vec<String>, hint: String },

    /// The x_auth exchange did not produce a usable token pair.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport failure, non-2xx status or unparsable body.
    #[error("request to {endpoint} failed: {cause}")]
    RequestFailed { endpoint: String, cause: String },

    /// Only raised inside the inline-image path, which recovers from it.
    #[error("image fetch failed: {0}")]
    ImageFetchFailed(String),

    /// A mutating tool was called without `confirm: true`.
    #[error("confirmation required")]
    ConfirmationRequired { prompt: Value },

    #[error("invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },
}

impl FanfouError {
    pub fn request_failed(endpoint: impl Into<String>, cause: impl ToString) -> Self {
        Self::RequestFailed {
            endpoint: endpoint.into(),
            cause: cause.to_string(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials { .. } => codes::MISSING_CREDENTIALS,
            Self::AuthenticationFailed(_) => codes::AUTHENTICATION_FAILED,
            Self::RequestFailed { .. } => codes::REQUEST_FAILED,
            Self::ImageFetchFailed(_) => codes::IMAGE_FETCH_FAILED,
            Self::ConfirmationRequired { .. } => codes::CONFIRMATION_REQUIRED,
            Self::InvalidArgument { .. } => codes::VALIDATION_FAILED,
        }
    }

    /// Data value handed back to the caller in place of a tool result.
    pub fn to_value(&self) -> Value {
        match self {
            Self::ConfirmationRequired { prompt } => prompt.clone(),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

/// Structured error body for the HTTP routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the workspace
pub mod codes {
    pub const MISSING_CREDENTIALS: &str = "missing_credentials";
    pub const AUTHENTICATION_FAILED: &str = "authentication_failed";
    pub const REQUEST_FAILED: &str = "request_failed";
    pub const IMAGE_FETCH_FAILED: &str = "image_fetch_failed";
    pub const CONFIRMATION_REQUIRED: &str = "confirmation_required";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
}
