//! Conversation keys and per-counterparty threads

use serde::{Deserialize, Serialize};
use std::fmt;
use tutorhub_api::{AccountId, Message, MessageId, ProfileRef, Role};

/// Key of a conversation
///
/// Conversations are keyed by the counterparty's role-specific profile id,
/// because that is what the messaging endpoints are addressed by. The
/// `Account` form only appears when a counterparty has the viewer's own role
/// or its profile could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationId {
    Profile(ProfileRef),
    Account(AccountId),
}

impl ConversationId {
    /// Key for the counterparty with `profile_id`, as seen by a `viewer_role` viewer
    pub fn with_counterparty(viewer_role: Role, profile_id: i64) -> Self {
        ConversationId::Profile(ProfileRef::new(viewer_role.opposite(), profile_id))
    }

    pub fn profile(&self) -> Option<ProfileRef> {
        match self {
            ConversationId::Profile(profile) => Some(*profile),
            ConversationId::Account(_) => None,
        }
    }
}

impl From<ProfileRef> for ConversationId {
    fn from(profile: ProfileRef) -> Self {
        ConversationId::Profile(profile)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationId::Profile(profile) => write!(f, "{profile}"),
            ConversationId::Account(account) => write!(f, "account:{account}"),
        }
    }
}

/// Messages exchanged with one counterparty
///
/// `messages` is ordered by `sent_at` ascending and `unread_count` is the
/// number of messages addressed to the viewer that are still unread.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub unread_count: u32,
}

impl Conversation {
    /// Build a thread from unordered messages, counting unread for `viewer`
    pub fn from_messages(mut messages: Vec<Message>, viewer: AccountId) -> Self {
        messages.sort_by_key(|m| m.sent_at);

        let unread_count = messages.iter().filter(|m| m.is_unread_for(viewer)).count() as u32;
        let last_message = messages.last().cloned();

        Self {
            messages,
            last_message,
            unread_count,
        }
    }

    /// Append a message the viewer just sent; it never counts as unread
    pub(crate) fn push_sent(&mut self, message: Message) {
        self.last_message = Some(message.clone());
        self.messages.push(message);
    }

    /// Flip `id` to read, returning whether the thread contains it
    pub(crate) fn mark_read(&mut self, id: MessageId, viewer: AccountId) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };

        if message.is_unread_for(viewer) {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        message.is_read = true;

        if let Some(last) = self.last_message.as_mut().filter(|m| m.id == id) {
            last.is_read = true;
        }
        true
    }

    /// Unread count recomputed from the messages themselves
    pub fn counted_unread(&self, viewer: AccountId) -> u32 {
        self.messages.iter().filter(|m| m.is_unread_for(viewer)).count() as u32
    }
}
