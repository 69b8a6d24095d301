pub mod auth;
pub mod handlers;
pub mod oauth;

use crate::calendar::{CalendarProvider, ProviderFactory};
use crate::config::{Config, ProviderConfig};
use crate::crypto::ApiKeyCipher;
use crate::error::AppResult;
use crate::store::{SessionStore, UserStore};
use auth::{AuthService, CurrentSession};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Provider endpoints and OAuth clients
    pub providers: ProviderConfig,
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub cipher: ApiKeyCipher,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> AppResult<Self> {
        let cipher = ApiKeyCipher::new(&config.encryption_key)?;
        let auth = Arc::new(AuthService::new(config.jwt_secret.clone(), config.session_ttl_hours));
        let providers = config.provider_config();

        Ok(Self {
            config: Arc::new(config),
            providers,
            auth,
            users,
            sessions,
            cipher,
        })
    }

    /// Cookies are marked Secure when served over https
    pub fn secure_cookies(&self) -> bool {
        self.config.public_url.starts_with("https://")
    }
}

/// Calendar provider for the session's tokens.
///
/// Refreshes the tokens when due, writes them back to the session and builds
/// the provider again from the new set.
pub async fn session_provider(
    state: &AppState,
    current: &CurrentSession,
) -> AppResult<Box<dyn CalendarProvider>> {
    let tag = current.session.provider.as_str();
    let provider =
        ProviderFactory::create_provider(tag, current.session.tokens.clone(), &state.providers)?;

    let tokens = provider.refresh_token_if_needed().await?;
    if &tokens == provider.tokens() {
        return Ok(provider);
    }

    state.sessions.update_tokens(&current.sid, &tokens).await?;
    info!("Stored refreshed {} tokens for user {}", tag, current.user_id);
    ProviderFactory::create_provider(tag, tokens, &state.providers)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/logout", post(oauth::logout))
        .route("/auth/{provider}", get(oauth::login))
        .route("/auth/{provider}/callback", get(oauth::callback))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/providers", get(handlers::providers))
        .route("/api/calendars", get(handlers::list_calendars))
        .route(
            "/api/events",
            get(handlers::list_events).post(handlers::create_event),
        )
        .route(
            "/api/events/{event_id}",
            patch(handlers::update_event).delete(handlers::delete_event),
        )
        .route("/api/chat", post(handlers::chat))
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/api/settings/api-key", delete(handlers::delete_api_key))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
