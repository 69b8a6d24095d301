//! OAuth authorization-code sign in for Google and Microsoft accounts

use super::auth::{extract_token, removal_cookie};
use super::AppState;
use crate::calendar::token::{exchange_code, TokenSet};
use crate::calendar::{endpoint, wrap_provider_error, ProviderKind};
use crate::config::OAuthClient;
use crate::error::{bad_request, AppResult};
use crate::store::{NewUser, Session};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

pub const GOOGLE_SCOPES: &str = "openid email profile https://www.googleapis.com/auth/calendar";
pub const MICROSOFT_SCOPES: &str = "openid profile email offline_access Calendars.ReadWrite User.Read";

const STATE_COOKIE: &str = "oauth_state";
const STATE_TTL_MINUTES: i64 = 10;
const SIGN_IN_FAILED: &str = "Failed to sign in";

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Profile fields common to both identity platforms
struct Profile {
    id: String,
    email: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    id: String,
    #[serde(default)]
    mail: Option<String>,
    #[serde(default)]
    user_principal_name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn state_cookie(value: String) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .path("/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(STATE_TTL_MINUTES))
        .build()
}

/// OAuth client and token endpoint for a configured provider
fn oauth_client(state: &AppState, kind: ProviderKind) -> AppResult<(&OAuthClient, &str)> {
    let client = match kind {
        ProviderKind::Google => state.config.google.as_ref(),
        ProviderKind::Outlook => state.config.microsoft.as_ref(),
    };
    let token_url = match kind {
        ProviderKind::Google => state.providers.google_token_url.as_str(),
        ProviderKind::Outlook => state.providers.microsoft_token_url.as_str(),
    };
    client
        .map(|c| (c, token_url))
        .ok_or_else(|| bad_request(&format!("Provider not configured: {}", kind)))
}

/// Consent screen URL
pub fn authorize_url(state: &AppState, kind: ProviderKind, csrf_state: &str) -> AppResult<Url> {
    let (client, _) = oauth_client(state, kind)?;
    let redirect_uri = state.config.redirect_uri(kind.as_str());

    let base = match kind {
        ProviderKind::Google => &state.providers.google_auth_url,
        ProviderKind::Outlook => &state.providers.microsoft_auth_url,
    };
    let mut url = Url::parse(base).map_err(|e| bad_request(&format!("Invalid authorize URL: {}", e)))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("client_id", &client.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", csrf_state);
        match kind {
            ProviderKind::Google => {
                pairs
                    .append_pair("scope", GOOGLE_SCOPES)
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent");
            }
            ProviderKind::Outlook => {
                pairs
                    .append_pair("scope", MICROSOFT_SCOPES)
                    .append_pair("response_mode", "query");
            }
        }
    }

    Ok(url)
}

/// `GET /auth/{provider}`
pub async fn login(
    Path(provider): Path<String>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Response> {
    let kind: ProviderKind = provider.parse()?;
    let csrf_state = Uuid::new_v4().simple().to_string();
    let url = authorize_url(&state, kind, &csrf_state)?;

    let jar = jar.add(state_cookie(format!("{}:{}", kind, csrf_state)));
    Ok((jar, found(url.as_str())).into_response())
}

async fn fetch_profile(state: &AppState, kind: ProviderKind, tokens: &TokenSet) -> Result<Profile, String> {
    let http = &state.providers.http;
    match kind {
        ProviderKind::Google => {
            let response = http
                .get(&state.providers.google_userinfo_url)
                .bearer_auth(&tokens.access_token)
                .send()
                .await
                .map_err(|e| format!("Userinfo request failed: {}", e))?
                .error_for_status()
                .map_err(|e| format!("Userinfo request failed: {}", e))?;
            let info: GoogleUserInfo = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse userinfo: {}", e))?;
            Ok(Profile {
                id: info.id,
                email: info.email.unwrap_or_default(),
                name: info.name,
            })
        }
        ProviderKind::Outlook => {
            let url = endpoint(&state.providers.graph_api_base, &["me"])?;
            let response = http
                .get(url)
                .bearer_auth(&tokens.access_token)
                .send()
                .await
                .map_err(|e| format!("Graph /me request failed: {}", e))?
                .error_for_status()
                .map_err(|e| format!("Graph /me request failed: {}", e))?;
            let user: GraphUser = response
                .json()
                .await
                .map_err(|e| format!("Failed to parse Graph user: {}", e))?;
            Ok(Profile {
                id: user.id,
                email: user.mail.or(user.user_principal_name).unwrap_or_default(),
                name: user.display_name,
            })
        }
    }
}

/// `GET /auth/{provider}/callback`
pub async fn callback(
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Response> {
    let kind: ProviderKind = provider.parse()?;

    if let Some(error) = params.error {
        warn!("{} sign in was not completed: {}", kind, error);
        return Err(bad_request("Authorization was denied"));
    }

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let received = params.state.map(|s| format!("{}:{}", kind, s));
    if expected.is_none() || expected != received {
        return Err(bad_request("Invalid OAuth state"));
    }
    let code = params
        .code
        .ok_or_else(|| bad_request("Missing authorization code"))?;

    let (client, token_url) = oauth_client(&state, kind)?;
    let scope = match kind {
        ProviderKind::Google => None,
        ProviderKind::Outlook => Some(MICROSOFT_SCOPES),
    };
    let tokens = exchange_code(
        &state.providers.http,
        token_url,
        client,
        &code,
        &state.config.redirect_uri(kind.as_str()),
        scope,
    )
    .await
    .map_err(|e| wrap_provider_error(kind.as_str(), SIGN_IN_FAILED, e))?;

    let profile = fetch_profile(&state, kind, &tokens)
        .await
        .map_err(|e| wrap_provider_error(kind.as_str(), SIGN_IN_FAILED, e))?;

    let user = state
        .users
        .find_or_create_user(&NewUser {
            provider: kind,
            provider_user_id: profile.id,
            email: profile.email,
            name: profile.name,
        })
        .await?;

    let session = Session {
        user_id: user.id,
        provider: kind,
        tokens,
    };
    let sid = state
        .sessions
        .create(&session, state.auth.session_ttl_secs())
        .await?;
    let token = state.auth.issue_token(user.id, &sid, kind)?;

    info!("User {} signed in with {}", user.id, kind);

    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path("/auth"))
        .add(state.auth.session_cookie(token, state.secure_cookies()));
    Ok((jar, found("/")).into_response())
}

/// `POST /auth/logout`
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Some(claims) = extract_token(&headers).and_then(|t| state.auth.validate_token(&t).ok()) {
        state.sessions.delete(&claims.sid).await?;
        info!("Session ended for user {}", claims.sub);
    }

    let jar = jar.remove(removal_cookie());
    Ok((jar, Json(json!({ "success": true }))).into_response())
}
