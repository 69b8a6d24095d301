use crate::error::{config_error, env_error, AppResult};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Default OpenRouter-compatible endpoint
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Model used when the user has not picked one
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const MICROSOFT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const MICROSOFT_LOGIN_BASE: &str = "https://login.microsoftonline.com";

/// OAuth client credentials for one identity platform
#[derive(Debug, Clone, Default)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthClient {
    fn from_env(id_var: &str, secret_var: &str) -> Option<Self> {
        let client_id = env::var(id_var).ok().filter(|v| !v.is_empty())?;
        let client_secret = env::var(secret_var).ok().filter(|v| !v.is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

/// Everything a calendar provider needs besides the user's tokens.
///
/// The URLs default to the real Google and Microsoft endpoints and are only
/// overridden in tests.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Shared HTTP client so connections are reused across requests
    pub http: reqwest::Client,
    pub google: OAuthClient,
    pub microsoft: OAuthClient,
    pub google_api_base: String,
    pub google_token_url: String,
    pub graph_api_base: String,
    pub microsoft_token_url: String,
    pub google_auth_url: String,
    pub google_userinfo_url: String,
    pub microsoft_auth_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            http: reqwest::Client::new(),
            google: OAuthClient::default(),
            microsoft: OAuthClient::default(),
            google_api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            graph_api_base: MICROSOFT_GRAPH_API_BASE.to_string(),
            microsoft_token_url: format!("{}/common/oauth2/v2.0/token", MICROSOFT_LOGIN_BASE),
            google_auth_url: GOOGLE_AUTH_URL.to_string(),
            google_userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            microsoft_auth_url: format!("{}/common/oauth2/v2.0/authorize", MICROSOFT_LOGIN_BASE),
        }
    }
}

/// LLM client settings shared by every request
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub default_model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            max_attempts: 2,
        }
    }
}

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Redis connection string for sessions
    pub redis_url: String,
    /// Secret for signing session JWTs
    pub jwt_secret: String,
    /// Base64 encoded 32 byte key for API key encryption
    pub encryption_key: String,
    /// Externally visible base URL, used for OAuth redirect URIs
    pub public_url: String,
    /// Directory holding the built frontend
    pub static_dir: String,
    pub session_ttl_hours: i64,
    pub google: Option<OAuthClient>,
    pub microsoft: Option<OAuthClient>,
    pub microsoft_tenant: String,
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present)
    pub fn load() -> AppResult<Self> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| env_error("DATABASE_URL"))?;
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| env_error("JWT_SECRET"))?;
        let encryption_key =
            env::var("ENCRYPTION_KEY").map_err(|_| env_error("ENCRYPTION_KEY"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|_| config_error("Invalid PORT format"))?,
            Err(_) => 3000,
        };
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let static_dir = env::var("STATIC_DIR").unwrap_or_else(|_| "./public".to_string());
        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24)?;

        let microsoft_tenant =
            env::var("MICROSOFT_TENANT").unwrap_or_else(|_| "common".to_string());

        let llm = LlmConfig {
            base_url: env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or("LLM_TIMEOUT_SECS", 60)?),
            max_attempts: parse_or("LLM_MAX_ATTEMPTS", 2)?,
        };

        Ok(Config {
            host,
            port,
            database_url,
            redis_url,
            jwt_secret,
            encryption_key,
            public_url,
            static_dir,
            session_ttl_hours,
            google: OAuthClient::from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            microsoft: OAuthClient::from_env("MICROSOFT_CLIENT_ID", "MICROSOFT_CLIENT_SECRET"),
            microsoft_tenant,
            llm,
        })
    }

    /// Provider settings derived from this configuration
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            google: self.google.clone().unwrap_or_default(),
            microsoft: self.microsoft.clone().unwrap_or_default(),
            microsoft_token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                MICROSOFT_LOGIN_BASE, self.microsoft_tenant
            ),
            microsoft_auth_url: format!(
                "{}/{}/oauth2/v2.0/authorize",
                MICROSOFT_LOGIN_BASE, self.microsoft_tenant
            ),
            ..ProviderConfig::default()
        }
    }

    /// Whether OAuth credentials are present for the given provider tag
    pub fn is_provider_configured(&self, provider: &str) -> bool {
        match provider {
            "google" => self.google.is_some(),
            "outlook" => self.microsoft.is_some(),
            _ => false,
        }
    }

    /// OAuth redirect URI for a provider's callback route
    pub fn redirect_uri(&self, provider: &str) -> String {
        format!("{}/auth/{}/callback", self.public_url, provider)
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> AppResult<T> {
    match env::var(var) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| config_error(&format!("Invalid {} format", var))),
        Err(_) => Ok(default),
    }
}
