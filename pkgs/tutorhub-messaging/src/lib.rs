//! Tutorhub Messaging - per-counterparty conversations
//!
//! Direct messages reference generic accounts, while the messaging endpoints
//! are addressed by role-specific profile id. [`ConversationAggregator`]
//! groups inbox and sent messages by the counterparty's profile id (resolved
//! through [`tutorhub_identity::IdentityResolver`]) and keeps per-thread
//! unread counts in step with sends and read receipts.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tutorhub_api::{ClientConfig, HttpClient};
//! use tutorhub_identity::{IdentityCache, IdentityResolver};
//! use tutorhub_messaging::ConversationAggregator;
//!
//! # async fn example(me: tutorhub_api::Account) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let client = Arc::new(HttpClient::new(&config)?);
//! let resolver = Arc::new(IdentityResolver::new(
//!     client.clone(),
//!     Arc::new(IdentityCache::new()),
//!     config.bulk_limit,
//! ));
//!
//! let aggregator = ConversationAggregator::new(client, resolver);
//! aggregator.set_current_account(me);
//! aggregator.load_conversations().await?;
//!
//! for (id, conversation) in aggregator.conversation_list() {
//!     println!("{id}: {} unread", conversation.unread_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod conversation;
pub mod display;
pub mod error;

pub use aggregator::ConversationAggregator;
pub use conversation::{Conversation, ConversationId};
pub use display::{CounterpartyDisplay, DisplaySource};
pub use error::{MessagingError, Result};
