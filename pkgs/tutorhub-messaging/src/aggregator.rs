//! Conversation aggregator
//!
//! This module assembles direct messages into per-counterparty threads:
//! - Merging inbox and sent messages into conversations keyed by the
//!   counterparty's profile id
//! - Tracking the last message and the viewer's unread count per thread
//! - Keeping local state in step with send and read-receipt calls
//!
//! State is only written after the network call it depends on has succeeded,
//! so a failed call leaves every conversation exactly as it was.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tutorhub_api::{Account, AccountId, Message, MessageGateway, MessageId, ProfileRef};
use tutorhub_identity::IdentityResolver;
use tutorhub_store::ContactHintStore;

use crate::conversation::{Conversation, ConversationId};
use crate::display::{CounterpartyDisplay, DisplaySource};
use crate::error::{MessagingError, Result};

pub struct ConversationAggregator {
    gateway: Arc<dyn MessageGateway>,
    resolver: Arc<IdentityResolver>,
    hints: Option<Arc<ContactHintStore>>,
    current: RwLock<Option<Account>>,
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl ConversationAggregator {
    /// Create an aggregator with no current account and no conversations
    pub fn new(gateway: Arc<dyn MessageGateway>, resolver: Arc<IdentityResolver>) -> Self {
        Self {
            gateway,
            resolver,
            hints: None,
            current: RwLock::new(None),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a contact hint store for display-name fallbacks
    pub fn with_hint_store(mut self, hints: Arc<ContactHintStore>) -> Self {
        self.hints = Some(hints);
        self
    }

    pub fn resolver(&self) -> &Arc<IdentityResolver> {
        &self.resolver
    }

    pub fn set_current_account(&self, account: Account) {
        info!(account = %account.id, role = %account.role, "Current account set");
        self.resolver.store_user_info(account.clone());
        *self.current.write() = Some(account);
    }

    pub fn current_account(&self) -> Option<Account> {
        self.current.read().clone()
    }

    /// Forget the current account and every loaded conversation
    pub fn sign_out(&self) {
        *self.current.write() = None;
        self.conversations.write().clear();
    }

    fn require_account(&self) -> Result<Account> {
        self.current_account().ok_or(MessagingError::Unauthenticated)
    }

    /// Rebuild every conversation from the inbox and sent lists
    ///
    /// Returns the number of conversations. On any fetch error the previous
    /// conversations are left untouched.
    #[instrument(skip(self))]
    pub async fn load_conversations(&self) -> Result<usize> {
        let me = self.require_account()?;

        if !self.resolver.ensure_initialized().await {
            warn!("Identity mappings unavailable, resolving counterparts on demand");
        }

        let (inbox, sent) =
            tokio::try_join!(self.gateway.inbox_messages(), self.gateway.sent_messages())
                .map_err(|e| {
                    error!("Failed to load conversations: {}", e);
                    e
                })?;

        let mut seen = HashSet::new();
        let mut resolved: HashMap<AccountId, ConversationId> = HashMap::new();
        let mut grouped: HashMap<ConversationId, Vec<Message>> = HashMap::new();

        for message in inbox.into_iter().chain(sent) {
            if !seen.insert(message.id) {
                continue;
            }

            let counterparty = message.counterparty_id(me.id);
            let id = match resolved.get(&counterparty) {
                Some(id) => *id,
                None => {
                    let id = self.conversation_id_for(&me, &message).await;
                    resolved.insert(counterparty, id);
                    id
                }
            };
            grouped.entry(id).or_default().push(message);
        }

        let rebuilt: HashMap<ConversationId, Conversation> = grouped
            .into_iter()
            .map(|(id, messages)| (id, Conversation::from_messages(messages, me.id)))
            .collect();

        let count = rebuilt.len();
        *self.conversations.write() = rebuilt;

        info!(conversations = count, "Conversations loaded");
        Ok(count)
    }

    /// Key for the thread `message` belongs to, from the viewer's side
    async fn conversation_id_for(&self, me: &Account, message: &Message) -> ConversationId {
        let counterparty = message.counterparty_id(me.id);
        let counterparty_role = message
            .counterparty(me.id)
            .map(|account| account.role)
            .unwrap_or_else(|| me.role.opposite());

        if counterparty_role == me.role {
            debug!(%counterparty, "Same-role counterparty, keying conversation by account id");
            return ConversationId::Account(counterparty);
        }

        match self
            .resolver
            .profile_for_account(counterparty, counterparty_role)
            .await
        {
            Some(profile) => ConversationId::Profile(profile),
            None => {
                warn!(
                    %counterparty,
                    role = %counterparty_role,
                    "No profile for counterparty, keying conversation by account id"
                );
                ConversationId::Account(counterparty)
            }
        }
    }

    /// Send `content` to the counterparty with profile id `profile_id`
    ///
    /// The recipient role is the opposite of the current account's role. The
    /// returned message is appended to the local thread; the unread count is
    /// not touched.
    #[instrument(skip(self, content))]
    pub async fn send_message(&self, profile_id: i64, content: &str) -> Result<Message> {
        let me = self.require_account()?;
        let recipient = ProfileRef::new(me.role.opposite(), profile_id);

        let message = self
            .gateway
            .send_message(content, recipient)
            .await
            .map_err(|e| {
                error!(%recipient, "Failed to send message: {}", e);
                e
            })?;

        self.conversations
            .write()
            .entry(ConversationId::Profile(recipient))
            .or_default()
            .push_sent(message.clone());

        debug!(message = %message.id, %recipient, "Message sent");
        Ok(message)
    }

    /// Refresh a single thread from the server, replacing the local copy
    #[instrument(skip(self))]
    pub async fn get_conversation(&self, profile_id: i64) -> Result<Conversation> {
        let me = self.require_account()?;
        let counterparty_role = me.role.opposite();

        let messages = self
            .gateway
            .conversation(counterparty_role, profile_id)
            .await?;
        let conversation = Conversation::from_messages(messages, me.id);

        self.conversations.write().insert(
            ConversationId::Profile(ProfileRef::new(counterparty_role, profile_id)),
            conversation.clone(),
        );

        Ok(conversation)
    }

    /// Send a read receipt and reflect it in every thread holding the message
    #[instrument(skip(self))]
    pub async fn mark_message_as_read(&self, id: MessageId) -> Result<()> {
        let me = self.require_account()?;

        if let Err(e) = self.gateway.mark_message_as_read(id).await {
            error!("Failed to mark message as read: {}", e);
            return Err(e.into());
        }

        // A message can sit in an account-keyed thread and a profile-keyed one
        let mut conversations = self.conversations.write();
        let found = conversations
            .values_mut()
            .fold(false, |found, conversation| conversation.mark_read(id, me.id) | found);
        if !found {
            debug!(message = %id, "Read message is not in any loaded conversation");
        }

        Ok(())
    }

    /// Total unread messages according to the server, 0 if it cannot be reached
    pub async fn get_unread_message_count(&self) -> u64 {
        match self.gateway.unread_message_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to fetch unread message count: {}", e);
                0
            }
        }
    }

    /// Open a chat with a counterparty picked from a user search
    ///
    /// Remembers the counterparty's display data locally (best effort) and
    /// returns the key its conversation will use.
    pub async fn start_chat(
        &self,
        profile_id: i64,
        counterparty: &Account,
    ) -> Result<ConversationId> {
        let me = self.require_account()?;
        let id = ConversationId::with_counterparty(me.role, profile_id);

        self.resolver.store_user_info(counterparty.clone());

        if let Some(hints) = &self.hints {
            if let Err(e) = hints.remember(me.role, profile_id, counterparty).await {
                warn!(conversation = %id, "Failed to store contact hint: {}", e);
            }
        }

        Ok(id)
    }

    /// Name and email to show for a conversation's counterparty
    ///
    /// Sources are tried in order: identity data (cache, then directory),
    /// the persisted contact hint, the account embedded in the thread's first
    /// message, and finally a generic placeholder.
    pub async fn counterparty_display(&self, id: ConversationId) -> CounterpartyDisplay {
        let account_id = match id {
            ConversationId::Profile(profile) => self.resolver.account_for_profile(profile).await,
            ConversationId::Account(account) => Some(account),
        };
        if let Some(account_id) = account_id {
            if let Some(account) = self.resolver.get_user_info(account_id).await {
                return CounterpartyDisplay::from_account(&account, DisplaySource::Identity);
            }
        }

        let me = self.current_account();

        if let (Some(hints), Some(me), Some(profile)) = (&self.hints, &me, id.profile()) {
            match hints.lookup(me.role, profile.id).await {
                Ok(Some(hint)) => return CounterpartyDisplay::from_hint(hint),
                Ok(None) => {}
                Err(e) => warn!(conversation = %id, "Failed to read contact hint: {}", e),
            }
        }

        if let Some(me) = &me {
            let embedded = self.conversations.read().get(&id).and_then(|conversation| {
                conversation
                    .messages
                    .first()
                    .and_then(|message| message.counterparty(me.id).cloned())
            });
            if let Some(account) = embedded {
                return CounterpartyDisplay::from_account(&account, DisplaySource::Message);
            }
        }

        CounterpartyDisplay::placeholder(id)
    }

    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.conversations.read().get(&id).cloned()
    }

    pub fn conversations(&self) -> HashMap<ConversationId, Conversation> {
        self.conversations.read().clone()
    }

    /// Conversations ordered by their last message, newest first
    pub fn conversation_list(&self) -> Vec<(ConversationId, Conversation)> {
        let mut list: Vec<(ConversationId, Conversation)> = self
            .conversations
            .read()
            .iter()
            .map(|(id, conversation)| (*id, conversation.clone()))
            .collect();

        list.sort_by(|(_, a), (_, b)| {
            let a = a.last_message.as_ref().map(|m| m.sent_at);
            let b = b.last_message.as_ref().map(|m| m.sent_at);
            b.cmp(&a)
        });
        list
    }
}
