pub mod postgres;
pub mod session;

pub use postgres::PgUserStore;
pub use session::{InMemorySessionStore, RedisSessionStore, Session, SessionStore};

use crate::calendar::ProviderKind;
use crate::crypto::EncryptedKey;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A user row. Exactly one of `google_id` and `outlook_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub provider: String,
    pub google_id: Option<String>,
    pub outlook_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per user settings; the API key is only ever stored encrypted
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub openrouter_api_key_encrypted: Option<String>,
    pub iv: Option<String>,
    pub model: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            openrouter_api_key_encrypted: None,
            iv: None,
            model: None,
            updated_at: Utc::now(),
        }
    }

    /// Encrypted key and its nonce, when both are stored
    pub fn encrypted_key(&self) -> Option<(&str, &str)> {
        match (
            self.openrouter_api_key_encrypted.as_deref(),
            self.iv.as_deref(),
        ) {
            (Some(key), Some(iv)) if !key.is_empty() && !iv.is_empty() => Some((key, iv)),
            _ => None,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.encrypted_key().is_some()
    }
}

/// Identity returned by a provider login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub provider: ProviderKind,
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Fields to change in `user_settings`; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub api_key: Option<EncryptedKey>,
    pub model: Option<String>,
}

/// Durable user and settings storage
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Insert the user or refresh their email and name, and make sure a
    /// settings row exists. Runs as one transaction.
    async fn find_or_create_user(&self, new_user: &NewUser) -> AppResult<User>;

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>>;

    async fn update_settings(&self, user_id: Uuid, update: &SettingsUpdate) -> AppResult<UserSettings>;

    /// Clear the stored key and its nonce
    async fn delete_api_key(&self, user_id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    settings: HashMap<Uuid, UserSettings>,
}

/// In-memory implementation of the user store (for testing)
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    tables: RwLock<Tables>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn settings_count(&self) -> usize {
        self.tables.read().await.settings.len()
    }
}

fn provider_id_of(user: &User, provider: ProviderKind) -> Option<&str> {
    match provider {
        ProviderKind::Google => user.google_id.as_deref(),
        ProviderKind::Outlook => user.outlook_id.as_deref(),
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_or_create_user(&self, new_user: &NewUser) -> AppResult<User> {
        // One write lock covers both tables, like the SQL transaction
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let existing = tables
            .users
            .values_mut()
            .find(|u| provider_id_of(u, new_user.provider) == Some(new_user.provider_user_id.as_str()));

        let user = match existing {
            Some(user) => {
                user.email = new_user.email.clone();
                user.name = new_user.name.clone();
                user.updated_at = now;
                user.clone()
            }
            None => {
                let (google_id, outlook_id) = match new_user.provider {
                    ProviderKind::Google => (Some(new_user.provider_user_id.clone()), None),
                    ProviderKind::Outlook => (None, Some(new_user.provider_user_id.clone())),
                };
                let user = User {
                    id: Uuid::new_v4(),
                    provider: new_user.provider.as_str().to_string(),
                    google_id,
                    outlook_id,
                    email: new_user.email.clone(),
                    name: new_user.name.clone(),
                    created_at: now,
                    updated_at: now,
                };
                tables.users.insert(user.id, user.clone());
                user
            }
        };

        tables
            .settings
            .entry(user.id)
            .or_insert_with(|| UserSettings::empty(user.id));

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>> {
        Ok(self.tables.read().await.settings.get(&user_id).cloned())
    }

    async fn update_settings(&self, user_id: Uuid, update: &SettingsUpdate) -> AppResult<UserSettings> {
        let mut tables = self.tables.write().await;
        let settings = tables
            .settings
            .entry(user_id)
            .or_insert_with(|| UserSettings::empty(user_id));

        if let Some(key) = &update.api_key {
            settings.openrouter_api_key_encrypted = Some(key.ciphertext.clone());
            settings.iv = Some(key.iv.clone());
        }
        if let Some(model) = &update.model {
            settings.model = Some(model.clone());
        }
        settings.updated_at = Utc::now();

        Ok(settings.clone())
    }

    async fn delete_api_key(&self, user_id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(settings) = tables.settings.get_mut(&user_id) {
            settings.openrouter_api_key_encrypted = None;
            settings.iv = None;
            settings.updated_at = Utc::now();
        }
        Ok(())
    }
}
