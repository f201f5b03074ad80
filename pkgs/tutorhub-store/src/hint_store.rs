//! Contact hint store for chat display names
//!
//! When a chat is started from a user search, the counterparty's account id,
//! username and email are written here under a key derived from the viewer's
//! role and the counterparty's profile id. Chat views read the hint to show a
//! name before richer identity data arrives. Hints are advisory: they are never
//! reconciled against the identity cache and never expire.

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tutorhub_api::{Account, AccountId, Role};

use crate::entities::contact_hints;
use crate::error::StoreError;
use crate::HintStoreConfig;

/// Display data remembered for a chat counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactHint {
    pub user_id: AccountId,
    pub username: String,
    pub email: String,
}

impl From<&Account> for ContactHint {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}

/// Storage key for a counterparty as seen by a viewer of `viewer_role`
pub fn hint_key(viewer_role: Role, counterparty_profile_id: i64) -> String {
    format!("{viewer_role}_chat_{counterparty_profile_id}")
}

/// Contact hint store
pub struct ContactHintStore {
    db: DatabaseConnection,
}

impl ContactHintStore {
    /// Create a store over an existing, migrated connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the SQLite database and run migrations
    pub async fn open(config: &HintStoreConfig) -> Result<Self> {
        let db_path_str = config
            .db_path
            .to_str()
            .context("Invalid database path")?
            .replace("\\", "/");

        let db_url = format!("sqlite:{}?mode=rwc", db_path_str);

        let db: DatabaseConnection = Database::connect(db_url.as_str())
            .await
            .context("Failed to connect to database")?;

        crate::migration::Migrator::up(&db, None)
            .await
            .context("Failed to run migrations")?;

        info!("Contact hint store initialized at {}", config.db_path.display());

        Ok(Self { db })
    }

    /// Write a hint, replacing any previous value under `key`
    pub async fn put(&self, key: &str, hint: &ContactHint) -> Result<(), StoreError> {
        let value = serde_json::to_string(hint)?;
        let now = chrono::Utc::now().timestamp_millis();

        let existing = contact_hints::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;

        if let Some(model) = existing {
            let mut active: contact_hints::ActiveModel = model.into();
            active.value = Set(value);
            active.updated_at = Set(now);
            active.update(&self.db).await?;
        } else {
            contact_hints::ActiveModel {
                key: Set(key.to_string()),
                value: Set(value),
                updated_at: Set(now),
            }
            .insert(&self.db)
            .await?;
        }

        debug!("Stored contact hint: {} -> {}", key, hint.username);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<ContactHint>, StoreError> {
        let model = contact_hints::Entity::find()
            .filter(contact_hints::Column::Key.eq(key))
            .one(&self.db)
            .await?;

        match model {
            Some(model) => Ok(Some(serde_json::from_str(&model.value)?)),
            None => Ok(None),
        }
    }

    /// Remember `counterparty` for a chat opened by a viewer of `viewer_role`
    pub async fn remember(
        &self,
        viewer_role: Role,
        counterparty_profile_id: i64,
        counterparty: &Account,
    ) -> Result<(), StoreError> {
        self.put(
            &hint_key(viewer_role, counterparty_profile_id),
            &ContactHint::from(counterparty),
        )
        .await
    }

    pub async fn lookup(
        &self,
        viewer_role: Role,
        counterparty_profile_id: i64,
    ) -> Result<Option<ContactHint>, StoreError> {
        self.get(&hint_key(viewer_role, counterparty_profile_id)).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let result = contact_hints::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        info!("Clearing all contact hints");

        let result = contact_hints::Entity::delete_many().exec(&self.db).await?;

        Ok(result.rows_affected)
    }
}
