//! Error types for the explorer gateway.
//!
//! Two layers live here. [`GatewayError`] is what the REST client and the
//! configuration code return. [`ClassifiedError`] is the closed taxonomy every
//! failure is reduced to before the rate limiter decides whether to retry it;
//! [`classify`] performs that reduction from a [`RawError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for client and configuration operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// The Aptos API answered with a non-success status
    #[error("Aptos API error: {0}")]
    Api(ApiError),

    /// A request failed after passing through the rate limiter
    #[error("{0}")]
    Classified(#[from] ClassifiedError),

    /// Caller supplied an argument the API would reject
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid response from the API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid gateway configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// An error response returned by the Aptos REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status (e.g. "Not Found")
    pub status_text: String,
    /// Message from the response body, or the raw body when it isn't JSON
    pub message: String,
    /// Aptos error code such as `account_not_found`, when present
    pub error_code: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} {} ({}): {}", self.status, self.status_text, code, self.message),
            None => write!(f, "{} {}: {}", self.status, self.status_text, self.message),
        }
    }
}

impl ApiError {
    /// Create a new API error from a status and message.
    pub fn new(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            message: message.into(),
            error_code: None,
        }
    }

    /// Attach the Aptos error code.
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        self.status == 429
    }

    /// Check if the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// The closed set of error kinds callers see from the rate limiter.
///
/// Serializes as `{"type": "...", "message": "..."}` with the message present
/// only for the variants that carry one.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ClassifiedError {
    /// The resource does not exist (HTTP 404)
    #[error("Not Found")]
    #[serde(rename = "Not Found")]
    NotFound,

    /// The request was malformed (HTTP 400)
    #[error("Invalid Input: {0}")]
    #[serde(rename = "Invalid Input")]
    InvalidInput(String),

    /// The upstream is throttling us (HTTP 429)
    #[error("Too Many Requests")]
    #[serde(rename = "Too Many Requests")]
    TooManyRequests,

    /// Anything else
    #[error("Unhandled: {0}")]
    #[serde(rename = "Unhandled")]
    Unhandled(String),
}

impl ClassifiedError {
    /// Whether the backoff layers may retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifiedError::TooManyRequests)
    }

    /// The display name of the kind, as used in the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedError::NotFound => "Not Found",
            ClassifiedError::InvalidInput(_) => "Invalid Input",
            ClassifiedError::TooManyRequests => "Too Many Requests",
            ClassifiedError::Unhandled(_) => "Unhandled",
        }
    }

    /// The message carried by the variant, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            ClassifiedError::InvalidInput(message) | ClassifiedError::Unhandled(message) => {
                Some(message)
            }
            ClassifiedError::NotFound | ClassifiedError::TooManyRequests => None,
        }
    }
}

/// A failure of unknown provenance, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawError {
    /// An HTTP-like error carrying a status code
    Status {
        /// Numeric status code
        status: u16,
        /// Reason phrase accompanying the status
        status_text: String,
    },
    /// An error object with a message
    Message(String),
    /// A value of any other shape, already stringified
    Unknown(String),
    /// An error that went through [`classify`] already
    Classified(ClassifiedError),
}

impl RawError {
    /// Create a status error with its canonical reason phrase.
    pub fn status(status: u16) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        RawError::Status {
            status,
            status_text,
        }
    }

    /// Wrap any standard error by its message.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        RawError::Message(error.to_string())
    }
}

const TOO_MANY_REQUESTS_NEEDLE: &str = "too many requests";

/// Map a raw error onto the [`ClassifiedError`] taxonomy.
///
/// Total and deterministic: every input maps to exactly one variant.
pub fn classify(raw: &RawError) -> ClassifiedError {
    match raw {
        RawError::Status {
            status,
            status_text,
        } => match status {
            404 => ClassifiedError::NotFound,
            429 => ClassifiedError::TooManyRequests,
            400 => ClassifiedError::InvalidInput(status_text.clone()),
            other => ClassifiedError::Unhandled(format!("{} {}", other, status_text).trim_end().to_string()),
        },
        RawError::Message(message) => {
            if message.to_lowercase().contains(TOO_MANY_REQUESTS_NEEDLE) {
                ClassifiedError::TooManyRequests
            } else {
                ClassifiedError::Unhandled(message.clone())
            }
        }
        RawError::Unknown(value) => ClassifiedError::Unhandled(value.clone()),
        RawError::Classified(classified) => classified.clone(),
    }
}

impl From<serde_json::Value> for RawError {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        if let Value::Object(map) = &value {
            if let Some(status) = map
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
            {
                let status_text = map
                    .get("statusText")
                    .or_else(|| map.get("status_text"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return match status_text {
                    Some(status_text) => RawError::Status {
                        status,
                        status_text,
                    },
                    None => RawError::status(status),
                };
            }
            if let Some(message) = map.get("message").and_then(Value::as_str) {
                return RawError::Message(message.to_string());
            }
        }

        match value {
            Value::String(s) => RawError::Unknown(s),
            other => RawError::Unknown(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RawError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => RawError::status(status.as_u16()),
            None => RawError::Message(error.to_string()),
        }
    }
}

impl From<GatewayError> for RawError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Api(api) => RawError::Status {
                status: api.status,
                status_text: api.status_text,
            },
            GatewayError::Http(http) => RawError::from(http),
            GatewayError::Classified(classified) => RawError::Classified(classified),
            GatewayError::InvalidInput(message) => RawError::Status {
                status: 400,
                status_text: message,
            },
            other => RawError::Message(other.to_string()),
        }
    }
}

impl From<ClassifiedError> for RawError {
    fn from(error: ClassifiedError) -> Self {
        RawError::Classified(error)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        RawError::Message(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        RawError::Message(message.to_string())
    }
}
