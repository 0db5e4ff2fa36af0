//! 远程错误码：将服务端失败归类为规范错误码及其重试语义。
//!
//! Remote failure classification.
//!
//! Every failure the remote service reports for a single request is folded into
//! one [`RemoteErrorCode`]. The code decides whether re-executing the same request
//! is worthwhile and gives callers a stable string to match on instead of raw
//! HTTP statuses or server exception names.
//!
//! ## Error Code Categories
//!
//! | Prefix | Category    | Description                    |
//! |--------|-------------|--------------------------------|
//! | E1xxx  | client      | Request-side errors            |
//! | E2xxx  | rate        | Throttling                     |
//! | E3xxx  | server      | Service-side errors            |
//! | E4xxx  | operational | State conflicts, cancellation  |
//! | E9xxx  | unknown     | Catch-all / unclassified       |
//!
//! ## Example
//!
//! ```rust
//! use sp_model::error_code::RemoteErrorCode;
//!
//! let code = RemoteErrorCode::from_http_status(429);
//! assert_eq!(code.code(), "E2001");
//! assert!(code.retryable());
//! assert_eq!(code.category(), "rate");
//! ```

use std::fmt;

/// Canonical classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCode {
    /// E1001: Malformed request or invalid property values
    InvalidRequest,
    /// E1002: Missing or expired credentials
    Authentication,
    /// E1003: Valid credentials but insufficient permissions
    PermissionDenied,
    /// E1004: Parent object or referenced field does not exist
    NotFound,
    /// E1005: Payload exceeds the service limit
    RequestTooLarge,
    /// E2001: Request throttled by the service
    RateLimited,
    /// E3001: Internal server error
    ServerError,
    /// E3002: Service temporarily unavailable
    Overloaded,
    /// E3003: Request timed out before a response was received
    Timeout,
    /// E4001: The object already exists or was modified concurrently
    Conflict,
    /// E4002: Request was cancelled by the client
    Cancelled,
    /// E9999: Error could not be classified
    Unknown,
}

impl RemoteErrorCode {
    /// Returns the canonical code string (e.g., `"E1001"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "E1001",
            Self::Authentication => "E1002",
            Self::PermissionDenied => "E1003",
            Self::NotFound => "E1004",
            Self::RequestTooLarge => "E1005",
            Self::RateLimited => "E2001",
            Self::ServerError => "E3001",
            Self::Overloaded => "E3002",
            Self::Timeout => "E3003",
            Self::Conflict => "E4001",
            Self::Cancelled => "E4002",
            Self::Unknown => "E9999",
        }
    }

    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Conflict => "conflict",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Whether re-executing the same request may succeed.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout
        )
    }

    /// Returns the category: `"client"`, `"rate"`, `"server"`, `"operational"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::NotFound
            | Self::RequestTooLarge => "client",
            Self::RateLimited => "rate",
            Self::ServerError | Self::Overloaded | Self::Timeout => "server",
            Self::Conflict | Self::Cancelled => "operational",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a server error code to a `RemoteErrorCode`.
    ///
    /// Server codes come as `"<hresult>, <exception type>"`
    /// (e.g. `"-2147024809, System.ArgumentException"`); only the exception type is
    /// inspected. Bare standard names (`"conflict"`) are accepted as well.
    pub fn from_server_code(server_code: &str) -> Option<Self> {
        let exception = server_code
            .rsplit(',')
            .next()
            .map(str::trim)
            .unwrap_or(server_code);
        let code = match exception {
            "invalid_request" | "System.ArgumentException" | "System.ArgumentNullException"
            | "Microsoft.SharePoint.Client.InvalidClientQueryException" => Self::InvalidRequest,
            "authentication" => Self::Authentication,
            "permission_denied" | "System.UnauthorizedAccessException" => Self::PermissionDenied,
            "not_found"
            | "System.IO.FileNotFoundException"
            | "Microsoft.SharePoint.SPFieldNotFoundException" => Self::NotFound,
            "conflict"
            | "Microsoft.SharePoint.SPDuplicateValuesFoundException"
            | "Microsoft.SharePoint.SPException.Duplicate" => Self::Conflict,
            "rate_limited" => Self::RateLimited,
            "server_error" => Self::ServerError,
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            _ => return None,
        };
        Some(code)
    }

    /// Maps an HTTP status code to the most likely `RemoteErrorCode`.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 | 412 => Self::Conflict,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502 | 503 => Self::Overloaded,
            504 => Self::Timeout,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
