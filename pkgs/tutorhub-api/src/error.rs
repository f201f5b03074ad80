//! Error types for API transport

use thiserror::Error;

/// Errors that can occur while talking to the marketplace API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {status} from {path}")]
    Status { status: u16, path: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    /// True when the server answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
