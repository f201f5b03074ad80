//! Transport seams used by the identity and messaging layers

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Account, AccountId, Message, MessageId, ProfileRef, Role, StudentId, StudentProfile,
    TeacherId, TeacherProfile,
};

/// Read access to accounts and role-specific profiles
///
/// Single-entity lookups return `Ok(None)` when the record does not exist.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_students(&self, skip: u32, limit: u32) -> Result<Vec<StudentProfile>>;

    async fn list_teachers(&self, skip: u32, limit: u32) -> Result<Vec<TeacherProfile>>;

    async fn list_accounts(&self, skip: u32, limit: u32) -> Result<Vec<Account>>;

    async fn student(&self, id: StudentId) -> Result<Option<StudentProfile>>;

    async fn teacher(&self, id: TeacherId) -> Result<Option<TeacherProfile>>;

    async fn account(&self, id: AccountId) -> Result<Option<Account>>;
}

/// Direct messaging endpoints, scoped to the authenticated account
///
/// Recipients and conversation counterparts are always role-specific profile
/// ids, never raw account ids. Returned messages embed both accounts.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_message(&self, content: &str, recipient: ProfileRef) -> Result<Message>;

    async fn inbox_messages(&self) -> Result<Vec<Message>>;

    async fn sent_messages(&self) -> Result<Vec<Message>>;

    async fn conversation(&self, counterparty_role: Role, counterparty_id: i64)
        -> Result<Vec<Message>>;

    async fn mark_message_as_read(&self, id: MessageId) -> Result<()>;

    async fn unread_message_count(&self) -> Result<u64>;

    async fn delete_message(&self, id: MessageId) -> Result<()>;
}
