//! Tests for remote failure classification

use sp_model::error_code::RemoteErrorCode;
use sp_model::RemoteFailure;

#[test]
fn test_retryable_codes() {
    let retryable = vec![
        RemoteErrorCode::RateLimited,
        RemoteErrorCode::ServerError,
        RemoteErrorCode::Overloaded,
        RemoteErrorCode::Timeout,
    ];

    for code in retryable {
        assert!(code.retryable(), "Error code '{}' should be retryable", code.name());
    }
}

#[test]
fn test_non_retryable_codes() {
    let non_retryable = vec![
        RemoteErrorCode::InvalidRequest,
        RemoteErrorCode::Authentication,
        RemoteErrorCode::PermissionDenied,
        RemoteErrorCode::NotFound,
        RemoteErrorCode::RequestTooLarge,
        RemoteErrorCode::Conflict,
        RemoteErrorCode::Cancelled,
        RemoteErrorCode::Unknown,
    ];

    for code in non_retryable {
        assert!(
            !code.retryable(),
            "Error code '{}' should NOT be retryable",
            code.name()
        );
    }
}

#[test]
fn test_status_to_failure() {
    let cases = [
        (400, "E1001", "client"),
        (401, "E1002", "client"),
        (403, "E1003", "client"),
        (404, "E1004", "client"),
        (409, "E4001", "operational"),
        (429, "E2001", "rate"),
        (500, "E3001", "server"),
        (503, "E3002", "server"),
        (504, "E3003", "server"),
        (599, "E9999", "unknown"),
    ];

    for (status, code, category) in cases {
        let failure = RemoteFailure::from_status(status, "x");
        assert_eq!(failure.status, Some(status));
        assert_eq!(failure.code.code(), code, "status {}", status);
        assert_eq!(failure.code.category(), category, "status {}", status);
    }
}

#[test]
fn test_server_code_overrides_status() {
    let failure = RemoteFailure::from_status(500, "dup").with_code(
        RemoteErrorCode::from_server_code(
            "-2130575214, Microsoft.SharePoint.SPDuplicateValuesFoundException",
        )
        .unwrap(),
    );
    assert_eq!(failure.code, RemoteErrorCode::Conflict);
    assert!(!failure.retryable());
    assert_eq!(failure.to_string(), "HTTP 500 (conflict): dup");
}
