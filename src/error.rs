use crate::batch::CorrelationId;
use crate::error_code::RemoteErrorCode;
use std::fmt;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Property or configuration key that caused the error (e.g., "field_internal_name", "config.base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., current entity state)
    pub details: Option<String>,
    /// Source of the error (e.g., "field_link_collection", "batch")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A failure reported by the remote service for exactly one request.
///
/// Clonable so the same failure can be stored on the entity and handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// HTTP status, when the failure came from an HTTP response.
    pub status: Option<u16>,
    pub code: RemoteErrorCode,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code,
            message: message.into(),
        }
    }

    /// Failure built from an HTTP status; the code is derived from the status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: RemoteErrorCode::from_http_status(status),
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: RemoteErrorCode) -> Self {
        self.code = code;
        self
    }

    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {} ({}): {}", status, self.code.name(), self.message),
            None => write!(f, "{}: {}", self.code.name(), self.message),
        }
    }
}

/// Unified error type for the data-access layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was empty or missing. Detected locally, never reaches the network.
    #[error("Invalid argument: {message}{}", format_context(.context))]
    InvalidArgument {
        message: String,
        context: ErrorContext,
    },

    /// An operation was invoked on an entity or batch outside its valid transitions.
    #[error("Invalid state: {message}{}", format_context(.context))]
    InvalidState {
        message: String,
        context: ErrorContext,
    },

    /// The batch executor reported a failure for this request.
    #[error("Remote operation failed (request {correlation_id}): {failure}")]
    RemoteOperationFailed {
        correlation_id: CorrelationId,
        failure: RemoteFailure,
    },

    /// Batch execution was cancelled before the round trip completed.
    #[error("Batch execution cancelled")]
    Cancelled,

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidArgument {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_state(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidState {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn remote(correlation_id: CorrelationId, failure: RemoteFailure) -> Self {
        Error::RemoteOperationFailed {
            correlation_id,
            failure,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidArgument { context, .. }
            | Error::InvalidState { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The remote failure behind this error, if it is one.
    pub fn remote_failure(&self) -> Option<&RemoteFailure> {
        match self {
            Error::RemoteOperationFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Fold a round-trip level error into a per-request failure.
    pub(crate) fn to_remote_failure(&self) -> RemoteFailure {
        match self {
            Error::RemoteOperationFailed { failure, .. } => failure.clone(),
            Error::Transport(crate::transport::TransportError::Http(e)) if e.is_timeout() => {
                RemoteFailure::new(RemoteErrorCode::Timeout, e.to_string())
            }
            Error::Transport(crate::transport::TransportError::Status { status, message }) => {
                RemoteFailure::from_status(*status, message.clone())
            }
            Error::Cancelled => RemoteFailure::new(RemoteErrorCode::Cancelled, self.to_string()),
            other => RemoteFailure::new(RemoteErrorCode::Unknown, other.to_string()),
        }
    }
}
