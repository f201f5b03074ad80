//! Tutorhub API - data model and transport for the tutoring marketplace
//!
//! This crate defines the records exchanged with the marketplace REST service
//! and the two seams the rest of the workspace talks through:
//!
//! - **Directory**: accounts plus role-specific student/teacher profiles
//! - **MessageGateway**: send, list, read-receipt and delete for direct messages
//!
//! Both are implemented by [`HttpClient`] (reqwest, bearer token per request)
//! and by [`InMemoryBackend`], which keeps everything in process memory and is
//! used for tests and offline demos.
//!
//! # Identifier spaces
//!
//! An [`Account`] is a generic identity. A [`StudentProfile`] or
//! [`TeacherProfile`] is owned by an account through `user_id` but has its own
//! primary id. Messages reference accounts; the messaging endpoints address
//! recipients by profile id ([`ProfileRef`]).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tutorhub_api::{ClientConfig, HttpClient, MessageGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     base_url: "http://localhost:8000/api/v1".into(),
//!     bearer_token: Some("token".into()),
//!     ..Default::default()
//! };
//!
//! let client = HttpClient::new(&config)?;
//! let unread = client.unread_message_count().await?;
//! println!("{unread} unread messages");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod model;

pub use error::{ApiError, Result};
pub use gateway::{Directory, MessageGateway};
pub use http::HttpClient;
pub use memory::{InMemoryBackend, Request};
pub use model::{
    Account, AccountId, Message, MessageId, Profile, ProfileRef, Role, StudentId,
    StudentProfile, Subject, TeacherId, TeacherProfile, UnreadCount,
};

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST service, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,

    /// Bearer token attached to every request (default: none)
    pub bearer_token: Option<String>,

    /// Page size for bulk list requests (default: 1000)
    pub bulk_limit: u32,

    /// Per-request timeout in seconds (default: 30s)
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            bearer_token: None,
            bulk_limit: 1000,
            request_timeout_secs: 30,
        }
    }
}
