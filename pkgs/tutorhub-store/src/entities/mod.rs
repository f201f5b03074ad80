//! Sea-ORM entities for tutorhub-store

pub mod contact_hints;

pub use contact_hints::Entity as ContactHints;
