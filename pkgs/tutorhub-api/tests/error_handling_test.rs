//! Error handling tests for tutorhub-api
//!
//! Tests error variants and their display output

use tutorhub_api::ApiError;

#[test]
fn test_status_error() {
    let error = ApiError::Status {
        status: 503,
        path: "messages/inbox".to_string(),
    };

    assert!(error.to_string().contains("503"));
    assert!(error.to_string().contains("messages/inbox"));
    assert!(!error.is_not_found());
}

#[test]
fn test_not_found_status() {
    let error = ApiError::Status {
        status: 404,
        path: "teachers/7".to_string(),
    };

    assert!(error.is_not_found());
}

#[test]
fn test_unavailable_error() {
    let error = ApiError::Unavailable("backend is offline".to_string());

    assert!(matches!(error, ApiError::Unavailable(_)));
    assert!(error.to_string().contains("Service unavailable"));
    assert!(error.to_string().contains("backend is offline"));
}

#[test]
fn test_decode_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{ invalid").unwrap_err();
    let error: ApiError = json_error.into();

    assert!(matches!(error, ApiError::Decode(_)));
    assert!(error.to_string().contains("Decode error"));
}

#[test]
fn test_invalid_url_conversion() {
    let url_error = url::Url::parse("::not a url").unwrap_err();
    let error: ApiError = url_error.into();

    assert!(matches!(error, ApiError::InvalidUrl(_)));
}
