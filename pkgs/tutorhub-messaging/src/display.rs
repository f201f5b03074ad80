//! Counterparty display data

use serde::Serialize;
use tutorhub_api::{Account, AccountId};
use tutorhub_store::ContactHint;

use crate::conversation::ConversationId;

/// Where a counterparty's display data came from, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DisplaySource {
    /// Identity cache or a directory fetch
    Identity,
    /// Locally persisted contact hint
    Hint,
    /// Account embedded in a loaded message
    Message,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterpartyDisplay {
    pub name: String,
    pub email: Option<String>,
    pub account_id: Option<AccountId>,
    pub source: DisplaySource,
}

impl CounterpartyDisplay {
    pub(crate) fn from_account(account: &Account, source: DisplaySource) -> Self {
        Self {
            name: account.username.clone(),
            email: Some(account.email.clone()),
            account_id: Some(account.id),
            source,
        }
    }

    pub(crate) fn from_hint(hint: ContactHint) -> Self {
        Self {
            name: hint.username,
            email: Some(hint.email),
            account_id: Some(hint.user_id),
            source: DisplaySource::Hint,
        }
    }

    /// Generic label such as "Teacher 7"
    pub fn placeholder(id: ConversationId) -> Self {
        let (name, account_id) = match id {
            ConversationId::Profile(profile) => {
                (format!("{} {}", profile.role.label(), profile.id), None)
            }
            ConversationId::Account(account) => (format!("User {account}"), Some(account)),
        };

        Self {
            name,
            email: None,
            account_id,
            source: DisplaySource::Placeholder,
        }
    }
}
