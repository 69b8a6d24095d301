use super::{NewUser, SettingsUpdate, User, UserSettings, UserStore};
use crate::calendar::ProviderKind;
use crate::error::{AppResult, Error};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const MAX_CONNECTIONS: u32 = 10;

const USER_COLUMNS: &str =
    "id, provider, google_id, outlook_id, email, name, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "user_id, openrouter_api_key_encrypted, iv, model, updated_at";

/// PostgreSQL user store over an explicit connection pool
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Open the pool
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        info!("Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("Migration failed: {}", e)))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Wait for checked out connections and close the pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}

fn upsert_user_sql(provider: ProviderKind) -> String {
    let id_column = match provider {
        ProviderKind::Google => "google_id",
        ProviderKind::Outlook => "outlook_id",
    };
    format!(
        "INSERT INTO users (provider, {id_column}, email, name) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT ({id_column}) DO UPDATE \
         SET email = EXCLUDED.email, name = EXCLUDED.name, updated_at = now() \
         RETURNING {USER_COLUMNS}"
    )
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_or_create_user(&self, new_user: &NewUser) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&upsert_user_sql(new_user.provider))
            .bind(new_user.provider.as_str())
            .bind(&new_user.provider_user_id)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>> {
        let settings = sqlx::query_as::<_, UserSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn update_settings(&self, user_id: Uuid, update: &SettingsUpdate) -> AppResult<UserSettings> {
        let (ciphertext, iv) = match &update.api_key {
            Some(key) => (Some(key.ciphertext.as_str()), Some(key.iv.as_str())),
            None => (None, None),
        };

        let settings = sqlx::query_as::<_, UserSettings>(&format!(
            "INSERT INTO user_settings (user_id, openrouter_api_key_encrypted, iv, model) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
             openrouter_api_key_encrypted = COALESCE(EXCLUDED.openrouter_api_key_encrypted, user_settings.openrouter_api_key_encrypted), \
             iv = COALESCE(EXCLUDED.iv, user_settings.iv), \
             model = COALESCE(EXCLUDED.model, user_settings.model), \
             updated_at = now() \
             RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(ciphertext)
        .bind(iv)
        .bind(&update.model)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn delete_api_key(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE user_settings SET openrouter_api_key_encrypted = NULL, iv = NULL, updated_at = now() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
