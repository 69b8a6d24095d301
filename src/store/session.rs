use crate::calendar::{ProviderKind, TokenSet};
use crate::error::{AppResult, Error};
use async_trait::async_trait;
use rand::distr::{Alphanumeric, SampleString};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Redis keys
mod keys {
    pub const SESSION_PREFIX: &str = "session:";

    pub fn session(sid: &str) -> String {
        format!("{}{}", SESSION_PREFIX, sid)
    }
}

const SESSION_ID_LEN: usize = 32;

/// Server side session record. OAuth tokens live only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub provider: ProviderKind,
    pub tokens: TokenSet,
}

/// Random session id
pub fn new_session_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), SESSION_ID_LEN)
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store a new session and return its id
    async fn create(&self, session: &Session, ttl_secs: u64) -> AppResult<String>;

    async fn get(&self, sid: &str) -> AppResult<Option<Session>>;

    /// Replace the tokens of an existing session, keeping its expiry
    async fn update_tokens(&self, sid: &str, tokens: &TokenSet) -> AppResult<()>;

    async fn delete(&self, sid: &str) -> AppResult<()>;
}

/// Redis backed sessions
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        info!("Connecting to Redis at {}", redis_url);
        let client = RedisClient::open(redis_url)
            .map_err(|e| Error::Session(format!("Failed to create Redis client: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Session(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session, ttl_secs: u64) -> AppResult<String> {
        let sid = new_session_id();
        let data = serde_json::to_string(session)?;

        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(keys::session(&sid), data, ttl_secs).await?;

        debug!("Created session for user {}", session.user_id);
        Ok(sid)
    }

    async fn get(&self, sid: &str) -> AppResult<Option<Session>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(keys::session(sid)).await?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn update_tokens(&self, sid: &str, tokens: &TokenSet) -> AppResult<()> {
        let Some(mut session) = self.get(sid).await? else {
            return Err(Error::Unauthenticated);
        };
        session.tokens = tokens.clone();
        let data = serde_json::to_string(&session)?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(keys::session(sid))
            .arg(data)
            .arg("KEEPTTL")
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, sid: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys::session(sid)).await?;
        Ok(())
    }
}

/// In-memory sessions (for testing). Expiry is not enforced.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under a known id
    pub async fn insert(&self, sid: &str, session: Session) {
        self.sessions.write().await.insert(sid.to_string(), session);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session, _ttl_secs: u64) -> AppResult<String> {
        let sid = new_session_id();
        self.insert(&sid, session.clone()).await;
        Ok(sid)
    }

    async fn get(&self, sid: &str) -> AppResult<Option<Session>> {
        Ok(self.sessions.read().await.get(sid).cloned())
    }

    async fn update_tokens(&self, sid: &str, tokens: &TokenSet) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(sid).ok_or(Error::Unauthenticated)?;
        session.tokens = tokens.clone();
        Ok(())
    }

    async fn delete(&self, sid: &str) -> AppResult<()> {
        self.sessions.write().await.remove(sid);
        Ok(())
    }
}
