use thiserror::Error;
use tutorhub_api::ApiError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Not authenticated: no current account")]
    Unauthenticated,

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
