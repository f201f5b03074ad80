//! In-process backend implementing the transport traits
//!
//! Holds accounts, profiles, and messages in memory and answers the same
//! contract as the REST API. Every call is appended to a request log, and the
//! whole backend can be switched offline to simulate transport failures.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::gateway::{Directory, MessageGateway};
use crate::http::paths;
use crate::model::{
    Account, AccountId, Message, MessageId, ProfileRef, Role, StudentId, StudentProfile,
    TeacherId, TeacherProfile,
};

/// A call received by [`InMemoryBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListStudents,
    ListTeachers,
    ListAccounts,
    Student(StudentId),
    Teacher(TeacherId),
    Account(AccountId),
    Send { content: String, recipient: ProfileRef },
    Inbox,
    Sent,
    Conversation(ProfileRef),
    MarkRead(MessageId),
    UnreadCount,
    Delete(MessageId),
}

#[derive(Default)]
struct BackendState {
    viewer: Option<AccountId>,
    accounts: BTreeMap<AccountId, Account>,
    students: BTreeMap<StudentId, StudentProfile>,
    teachers: BTreeMap<TeacherId, TeacherProfile>,
    messages: Vec<Message>,
    next_message_id: i64,
    requests: Vec<Request>,
}

impl BackendState {
    fn owner_of(&self, profile: ProfileRef) -> Option<AccountId> {
        match profile.role {
            Role::Student => self.students.get(&StudentId(profile.id)).map(|s| s.user_id),
            Role::Teacher => self.teachers.get(&TeacherId(profile.id)).map(|t| t.user_id),
        }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let latest = self.messages.iter().map(|m| m.sent_at).max();
        match latest {
            Some(ts) => ts + Duration::minutes(1),
            // 2024-01-01T09:00:00Z
            None => DateTime::from_timestamp(1_704_099_600, 0).unwrap_or_default(),
        }
    }
}

/// Memory-backed [`Directory`] and [`MessageGateway`]
#[derive(Default)]
pub struct InMemoryBackend {
    state: RwLock<BackendState>,
    offline: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the account the messaging endpoints act on behalf of
    pub fn set_viewer(&self, account: AccountId) {
        self.state.write().viewer = Some(account);
    }

    /// Make every subsequent call fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn add_account(&self, account: Account) {
        self.state.write().accounts.insert(account.id, account);
    }

    pub fn add_student(&self, profile: StudentProfile) {
        self.state.write().students.insert(profile.id, profile);
    }

    pub fn add_teacher(&self, profile: TeacherProfile) {
        self.state.write().teachers.insert(profile.id, profile);
    }

    /// Seed a message as-is, keeping its id and timestamp
    pub fn insert_message(&self, message: Message) {
        let mut state = self.state.write();
        state.next_message_id = state.next_message_id.max(message.id.0);
        state.messages.push(message);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.read().messages.clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.read().requests.clone()
    }

    /// Number of logged requests matching `predicate`
    pub fn request_count(&self, predicate: impl Fn(&Request) -> bool) -> usize {
        self.state.read().requests.iter().filter(|r| predicate(r)).count()
    }

    pub fn clear_requests(&self) {
        self.state.write().requests.clear();
    }

    fn record(&self, request: Request) -> Result<()> {
        debug!(?request, "In-memory backend request");
        self.state.write().requests.push(request);

        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("backend is offline".to_string()));
        }
        Ok(())
    }

    fn viewer(&self, path: &str) -> Result<AccountId> {
        self.state.read().viewer.ok_or_else(|| ApiError::Status {
            status: 401,
            path: path.to_string(),
        })
    }
}

fn page<T>(items: impl Iterator<Item = T>, skip: u32, limit: u32) -> Vec<T> {
    items.skip(skip as usize).take(limit as usize).collect()
}

fn not_found(path: String) -> ApiError {
    ApiError::Status { status: 404, path }
}

#[async_trait]
impl Directory for InMemoryBackend {
    async fn list_students(&self, skip: u32, limit: u32) -> Result<Vec<StudentProfile>> {
        self.record(Request::ListStudents)?;
        Ok(page(self.state.read().students.values().cloned(), skip, limit))
    }

    async fn list_teachers(&self, skip: u32, limit: u32) -> Result<Vec<TeacherProfile>> {
        self.record(Request::ListTeachers)?;
        Ok(page(self.state.read().teachers.values().cloned(), skip, limit))
    }

    async fn list_accounts(&self, skip: u32, limit: u32) -> Result<Vec<Account>> {
        self.record(Request::ListAccounts)?;
        Ok(page(self.state.read().accounts.values().cloned(), skip, limit))
    }

    async fn student(&self, id: StudentId) -> Result<Option<StudentProfile>> {
        self.record(Request::Student(id))?;
        Ok(self.state.read().students.get(&id).cloned())
    }

    async fn teacher(&self, id: TeacherId) -> Result<Option<TeacherProfile>> {
        self.record(Request::Teacher(id))?;
        Ok(self.state.read().teachers.get(&id).cloned())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.record(Request::Account(id))?;
        Ok(self.state.read().accounts.get(&id).cloned())
    }
}

#[async_trait]
impl MessageGateway for InMemoryBackend {
    async fn send_message(&self, content: &str, recipient: ProfileRef) -> Result<Message> {
        self.record(Request::Send {
            content: content.to_string(),
            recipient,
        })?;
        let sender_id = self.viewer(paths::MESSAGES)?;

        let mut state = self.state.write();
        let recipient_id = state
            .owner_of(recipient)
            .ok_or_else(|| not_found(paths::MESSAGES.to_string()))?;

        state.next_message_id += 1;
        let message = Message {
            id: MessageId(state.next_message_id),
            sender_id,
            recipient_id,
            content: content.to_string(),
            sent_at: state.next_timestamp(),
            is_read: false,
            sender: state.accounts.get(&sender_id).cloned(),
            recipient: state.accounts.get(&recipient_id).cloned(),
        };
        state.messages.push(message.clone());

        Ok(message)
    }

    async fn inbox_messages(&self) -> Result<Vec<Message>> {
        self.record(Request::Inbox)?;
        let viewer = self.viewer(paths::INBOX)?;

        let state = self.state.read();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.recipient_id == viewer)
            .cloned()
            .collect())
    }

    async fn sent_messages(&self) -> Result<Vec<Message>> {
        self.record(Request::Sent)?;
        let viewer = self.viewer(paths::SENT)?;

        let state = self.state.read();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.sender_id == viewer)
            .cloned()
            .collect())
    }

    async fn conversation(
        &self,
        counterparty_role: Role,
        counterparty_id: i64,
    ) -> Result<Vec<Message>> {
        let profile = ProfileRef::new(counterparty_role, counterparty_id);
        let path = paths::conversation(counterparty_role, counterparty_id);
        self.record(Request::Conversation(profile))?;
        let viewer = self.viewer(&path)?;

        let state = self.state.read();
        let counterparty = state.owner_of(profile).ok_or_else(|| not_found(path))?;

        let mut thread: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == viewer && m.recipient_id == counterparty)
                    || (m.sender_id == counterparty && m.recipient_id == viewer)
            })
            .cloned()
            .collect();
        thread.sort_by_key(|m| m.sent_at);

        Ok(thread)
    }

    async fn mark_message_as_read(&self, id: MessageId) -> Result<()> {
        self.record(Request::MarkRead(id))?;

        let mut state = self.state.write();
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(paths::mark_read(id)))?;
        message.is_read = true;

        Ok(())
    }

    async fn unread_message_count(&self) -> Result<u64> {
        self.record(Request::UnreadCount)?;
        let viewer = self.viewer(paths::UNREAD_COUNT)?;

        let state = self.state.read();
        Ok(state
            .messages
            .iter()
            .filter(|m| m.is_unread_for(viewer))
            .count() as u64)
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        self.record(Request::Delete(id))?;

        let mut state = self.state.write();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        if state.messages.len() == before {
            return Err(not_found(paths::message(id)));
        }

        Ok(())
    }
}
