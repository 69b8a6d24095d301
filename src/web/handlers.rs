use super::auth::CurrentSession;
use super::{session_provider, AppState};
use crate::calendar::{Calendar, CalendarEvent, EventPatch, EventQuery, ProviderFactory};
use crate::chat::{build_system_prompt, run_chat_turn, ChatMessage, OpenRouterClient};
use crate::error::{bad_request, credential_error, AppResult, Error};
use crate::store::{SettingsUpdate, UserSettings};
use crate::utils::time::{default_chat_window, resolve_timezone};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const API_KEY_REQUIRED: &str =
    "Please configure your OpenRouter API key in settings before using chat.";

/// Upper bound for `maxResults`
const MAX_RESULTS_LIMIT: usize = 2500;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub provider: String,
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, current: CurrentSession) -> AppResult<Json<MeResponse>> {
    let user = state
        .users
        .get_user(current.user_id)
        .await?
        .ok_or(Error::Unauthenticated)?;

    Ok(Json(MeResponse {
        id: user.id.to_string(),
        email: user.email,
        name: user.name,
        provider: user.provider,
    }))
}

/// `GET /api/auth/providers`: supported providers that have OAuth credentials
pub async fn providers(State(state): State<AppState>) -> Json<Value> {
    let providers: Vec<&str> = ProviderFactory::list_supported_providers()
        .iter()
        .copied()
        .filter(|p| state.config.is_provider_configured(p))
        .collect();
    Json(json!({ "providers": providers }))
}

/// `GET /api/calendars`
pub async fn list_calendars(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<Json<Vec<Calendar>>> {
    let provider = session_provider(&state, &current).await?;
    Ok(Json(provider.list_calendars().await?))
}

/// `GET /api/events`
pub async fn list_events(
    State(state): State<AppState>,
    current: CurrentSession,
    Query(mut query): Query<EventQuery>,
) -> AppResult<Json<Vec<CalendarEvent>>> {
    query.max_results = query.max_results.clamp(1, MAX_RESULTS_LIMIT);
    let provider = session_provider(&state, &current).await?;
    Ok(Json(provider.get_events(&query).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventBody {
    #[serde(default)]
    pub calendar_id: Option<String>,
    pub event: CalendarEvent,
}

/// `POST /api/events`
pub async fn create_event(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<CreateEventBody>,
) -> AppResult<(StatusCode, Json<CalendarEvent>)> {
    body.event.validate_for_create()?;
    let provider = session_provider(&state, &current).await?;
    let created = provider
        .create_event(body.calendar_id.as_deref(), &body.event)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventBody {
    #[serde(default)]
    pub calendar_id: Option<String>,
    pub event: EventPatch,
}

/// `PATCH /api/events/{event_id}`
pub async fn update_event(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(event_id): Path<String>,
    Json(body): Json<UpdateEventBody>,
) -> AppResult<Json<CalendarEvent>> {
    if body.event.is_empty() {
        return Err(bad_request("No fields to update"));
    }
    let provider = session_provider(&state, &current).await?;
    let updated = provider
        .update_event(body.calendar_id.as_deref(), &event_id, &body.event)
        .await?;
    Ok(Json(updated))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarParam {
    #[serde(default)]
    pub calendar_id: Option<String>,
}

/// `DELETE /api/events/{event_id}`
pub async fn delete_event(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(event_id): Path<String>,
    Query(params): Query<CalendarParam>,
) -> AppResult<StatusCode> {
    let provider = session_provider(&state, &current).await?;
    provider
        .delete_event(params.calendar_id.as_deref(), &event_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub time_min: Option<String>,
    #[serde(default)]
    pub time_max: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub tools_executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<CalendarEvent>>,
}

/// Only user and assistant turns with text are forwarded to the model
fn conversation_history(messages: &[IncomingMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .filter(|m| matches!(m.role.as_str(), "user" | "assistant"))
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| ChatMessage::new(m.role.as_str(), m.content.as_str()))
        .collect()
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<ChatBody>,
) -> AppResult<Json<ChatReply>> {
    // No model or provider traffic happens without a stored key
    let settings = state
        .users
        .get_settings(current.user_id)
        .await?
        .filter(UserSettings::has_api_key)
        .ok_or_else(|| credential_error(API_KEY_REQUIRED))?;
    let (ciphertext, iv) = settings
        .encrypted_key()
        .ok_or_else(|| credential_error(API_KEY_REQUIRED))?;

    let history = conversation_history(&body.messages);
    if history.is_empty() {
        return Err(bad_request("At least one message is required"));
    }

    let api_key = state.cipher.decrypt(ciphertext, iv)?;
    let model = OpenRouterClient::new(&state.config.llm, api_key, settings.model.as_deref())?;

    let provider = session_provider(&state, &current).await?;

    let now = Utc::now();
    let tz = resolve_timezone(body.timezone.as_deref());
    let (default_min, default_max) = default_chat_window(now);
    let query = EventQuery::between(
        body.time_min.unwrap_or(default_min),
        body.time_max.unwrap_or(default_max),
    );

    let events = provider.get_events(&query).await?;
    let system_prompt = build_system_prompt(&events, tz, now);

    let outcome = run_chat_turn(&model, provider.as_ref(), &system_prompt, &history).await?;

    let events = if outcome.tools_executed {
        match provider.get_events(&query).await {
            Ok(events) => Some(events),
            Err(e) => {
                warn!("Could not re-fetch events after tool calls: {}", e);
                None
            }
        }
    } else {
        None
    };

    info!(
        "Chat turn for user {} finished (tools executed: {})",
        current.user_id, outcome.tools_executed
    );

    Ok(Json(ChatReply {
        message: outcome.message,
        tools_executed: outcome.tools_executed,
        events,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub has_api_key: bool,
    pub model: Option<String>,
}

impl From<Option<UserSettings>> for SettingsResponse {
    fn from(settings: Option<UserSettings>) -> Self {
        match settings {
            Some(settings) => Self {
                has_api_key: settings.has_api_key(),
                model: settings.model,
            },
            None => Self {
                has_api_key: false,
                model: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// `GET /api/settings`
pub async fn get_settings(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<Json<SettingsResponse>> {
    let settings = state.users.get_settings(current.user_id).await?;
    Ok(Json(settings.into()))
}

/// `PUT /api/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<SettingsBody>,
) -> AppResult<Json<SettingsResponse>> {
    let api_key = match body.api_key.as_deref().map(str::trim) {
        Some("") => return Err(bad_request("API key must not be empty")),
        Some(key) => Some(state.cipher.encrypt(key)?),
        None => None,
    };
    let model = body
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    let settings = state
        .users
        .update_settings(current.user_id, &SettingsUpdate { api_key, model })
        .await?;
    info!("Updated settings for user {}", current.user_id);

    Ok(Json(Some(settings).into()))
}

/// `DELETE /api/settings/api-key`
pub async fn delete_api_key(
    State(state): State<AppState>,
    current: CurrentSession,
) -> AppResult<Json<SettingsResponse>> {
    state.users.delete_api_key(current.user_id).await?;
    info!("Removed API key for user {}", current.user_id);

    let settings = state.users.get_settings(current.user_id).await?;
    Ok(Json(settings.into()))
}
