//! Tutorhub Identity - account ⇄ profile reconciliation
//!
//! Accounts are generic identities; the messaging endpoints address people by
//! their role-specific student or teacher profile id. This crate keeps the two
//! id spaces reconciled:
//!
//! - **IdentityCache**: bidirectional account ↔ profile maps plus record snapshots
//! - **IdentityResolver**: bulk initialization and point lookups with
//!   fetch-and-cache fallback, over any [`tutorhub_api::Directory`]

pub mod cache;
pub mod resolver;

pub use cache::{IdentityCache, IdentityMaps};
pub use resolver::IdentityResolver;
