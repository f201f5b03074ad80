//! Tutorhub Store - local persistence for chat display hints
//!
//! A small SQLite database (via Sea-ORM) holding best-effort display data for
//! chat counterparties. It stands in for browser local storage: string key to
//! JSON `{userId, username, email}`, no expiry, cleared only on request.
//!
//! # Database Schema
//!
//! - `contact_hints`: key, JSON value, last update time

pub mod entities;
pub mod error;
pub mod hint_store;
pub mod migration;

pub use error::StoreError;
pub use hint_store::{hint_key, ContactHint, ContactHintStore};

/// Configuration for the hint store
#[derive(Debug, Clone)]
pub struct HintStoreConfig {
    /// Path to the SQLite database file
    pub db_path: std::path::PathBuf,
}

impl Default for HintStoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::path::PathBuf::from("tutorhub-hints.db"),
        }
    }
}
