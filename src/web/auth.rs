use super::AppState;
use crate::calendar::ProviderKind;
use crate::error::{AppResult, Error};
use crate::store::Session;
use axum::extract::FromRequestParts;
use axum::http::{header, HeaderMap};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};
use uuid::Uuid;

/// Cookie holding the session JWT
pub const AUTH_COOKIE: &str = "auth_token";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Session ID in the session store
    pub sid: String,
    pub provider: ProviderKind,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// Auth service for token operations
pub struct AuthService {
    jwt_secret: String,
    session_ttl: Duration,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt_secret", &"[REDACTED]")
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>, session_ttl_hours: i64) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Session lifetime, shared by the JWT, the cookie and the session record
    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl.num_seconds().max(0) as u64
    }

    /// Generate a new JWT token
    pub fn issue_token(&self, user_id: Uuid, sid: &str, provider: ProviderKind) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + self.session_ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            sid: sid.to_string(),
            provider,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Failed to generate token: {}", e);
            Error::Session(format!("Failed to generate token: {}", e))
        })
    }

    /// Validate a JWT token
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|token_data| token_data.claims)
        .map_err(|e| {
            debug!("JWT validation error: {:?}", e);
            Error::Unauthenticated
        })
    }

    /// Cookie carrying a freshly issued token
    pub fn session_cookie(&self, token: String, secure: bool) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.session_ttl.num_seconds()))
            .build()
    }
}

/// Cookie that clears the session cookie
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, "")).path("/").build()
}

/// Read the JWT from the auth cookie, or from a Bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Authenticated request: valid JWT plus a live session record
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user_id: Uuid,
    pub sid: String,
    pub session: Session,
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(Error::Unauthenticated)?;
        let claims = state.auth.validate_token(&token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthenticated)?;

        let session = state
            .sessions
            .get(&claims.sid)
            .await?
            .ok_or(Error::Unauthenticated)?;
        if session.user_id != user_id || session.provider != claims.provider {
            return Err(Error::Unauthenticated);
        }

        Ok(CurrentSession {
            user_id,
            sid: claims.sid,
            session,
        })
    }
}
