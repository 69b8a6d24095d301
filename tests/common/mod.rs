//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use calchat::calendar::{
    Calendar, CalendarEvent, CalendarProvider, EventDateTime, EventPatch, EventQuery, ProviderKind,
    TokenSet,
};
use calchat::chat::{ChatMessage, ChatModel};
use calchat::config::{Config, LlmConfig, OAuthClient};
use calchat::error::{provider_error, AppResult, Error};
use calchat::store::{InMemorySessionStore, InMemoryUserStore, NewUser, Session, SessionStore, UserStore};
use calchat::web::{router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

/// base64 of "0123456789abcdef0123456789abcdef"
pub const TEST_ENCRYPTION_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

pub fn test_config(llm_base_url: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://localhost/calchat_test".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        jwt_secret: "test-jwt-secret".to_string(),
        encryption_key: TEST_ENCRYPTION_KEY.to_string(),
        public_url: "http://localhost:3000".to_string(),
        static_dir: "./does-not-exist".to_string(),
        session_ttl_hours: 24,
        google: Some(OAuthClient {
            client_id: "google-client".to_string(),
            client_secret: "google-secret".to_string(),
        }),
        microsoft: None,
        microsoft_tenant: "common".to_string(),
        llm: LlmConfig {
            base_url: llm_base_url.to_string(),
            default_model: "test/model".to_string(),
            timeout: Duration::from_secs(5),
            max_attempts: 1,
        },
    }
}

/// App wired to in-memory stores. Provider and LLM traffic goes to `mock_uri`.
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<InMemoryUserStore>,
    pub sessions: Arc<InMemorySessionStore>,
}

impl TestApp {
    pub fn new(mock_uri: &str) -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let user_store: Arc<dyn UserStore> = users.clone();
        let session_store: Arc<dyn SessionStore> = sessions.clone();

        let mut state = AppState::new(test_config(mock_uri), user_store, session_store)
            .expect("test state");
        state.providers.google_api_base = mock_uri.to_string();
        state.providers.graph_api_base = mock_uri.to_string();
        state.providers.google_token_url = format!("{}/token", mock_uri);
        state.providers.microsoft_token_url = format!("{}/token", mock_uri);
        state.providers.google_userinfo_url = format!("{}/userinfo", mock_uri);

        Self {
            state,
            users,
            sessions,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Seed a user plus a live session and return (user id, JWT)
    pub async fn sign_in(&self, provider: ProviderKind) -> (Uuid, String) {
        let user = self
            .users
            .find_or_create_user(&NewUser {
                provider,
                provider_user_id: "provider-user-1".to_string(),
                email: "ada@example.com".to_string(),
                name: Some("Ada".to_string()),
            })
            .await
            .expect("user");

        let session = Session {
            user_id: user.id,
            provider,
            tokens: TokenSet::new("access-token"),
        };
        let sid = self.sessions.create(&session, 3600).await.expect("session");
        let token = self
            .state
            .auth
            .issue_token(user.id, &sid, provider)
            .expect("token");
        (user.id, token)
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("auth_token={}", token));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn send_json(method: &str, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Run one request through the router and decode the JSON body (Null if empty)
pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

pub fn timed_event(summary: &str, start: &str, end: &str) -> CalendarEvent {
    CalendarEvent {
        summary: summary.to_string(),
        start: EventDateTime::timed(start, "UTC"),
        end: EventDateTime::timed(end, "UTC"),
        ..CalendarEvent::default()
    }
}

/// Scripted chat model that replays canned replies and records what it was sent
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ChatMessage>>,
    /// (message count, tool count) per call
    pub calls: Mutex<Vec<(usize, usize)>>,
    pub last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[Value]) -> AppResult<ChatMessage> {
        self.calls.lock().unwrap().push((messages.len(), tools.len()));
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Llm("script exhausted".to_string()))
    }
}

/// Provider double that records writes.
///
/// Creating an event titled "fail" and deleting the id "missing" both error.
pub struct RecordingProvider {
    pub fetched: Mutex<usize>,
    pub created: Mutex<Vec<String>>,
    pub updated: Mutex<Vec<(String, EventPatch)>>,
    pub deleted: Mutex<Vec<String>>,
    tokens: TokenSet,
}

impl RecordingProvider {
    /// True when nothing was read from or written to the calendar
    pub fn untouched(&self) -> bool {
        *self.fetched.lock().unwrap() == 0
            && self.created.lock().unwrap().is_empty()
            && self.updated.lock().unwrap().is_empty()
            && self.deleted.lock().unwrap().is_empty()
    }

    pub fn new() -> Self {
        Self {
            fetched: Mutex::default(),
            created: Mutex::default(),
            updated: Mutex::default(),
            deleted: Mutex::default(),
            tokens: TokenSet::new("access-token"),
        }
    }
}

#[async_trait]
impl CalendarProvider for RecordingProvider {
    fn provider_name(&self) -> &'static str {
        "google"
    }

    fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>> {
        Ok(Vec::new())
    }

    async fn get_events(&self, _query: &EventQuery) -> AppResult<Vec<CalendarEvent>> {
        *self.fetched.lock().unwrap() += 1;
        Ok(Vec::new())
    }

    async fn create_event(
        &self,
        _calendar_id: Option<&str>,
        event: &CalendarEvent,
    ) -> AppResult<CalendarEvent> {
        if event.summary == "fail" {
            return Err(provider_error("Failed to create event"));
        }
        self.created.lock().unwrap().push(event.summary.clone());
        Ok(CalendarEvent {
            id: format!("created-{}", event.summary),
            ..event.clone()
        })
    }

    async fn update_event(
        &self,
        _calendar_id: Option<&str>,
        event_id: &str,
        patch: &EventPatch,
    ) -> AppResult<CalendarEvent> {
        self.updated
            .lock()
            .unwrap()
            .push((event_id.to_string(), patch.clone()));
        Ok(CalendarEvent {
            id: event_id.to_string(),
            ..CalendarEvent::default()
        })
    }

    async fn delete_event(&self, _calendar_id: Option<&str>, event_id: &str) -> AppResult<()> {
        if event_id == "missing" {
            return Err(provider_error("Failed to delete event"));
        }
        self.deleted.lock().unwrap().push(event_id.to_string());
        Ok(())
    }

    async fn refresh_token_if_needed(&self) -> AppResult<TokenSet> {
        Ok(self.tokens().clone())
    }
}
