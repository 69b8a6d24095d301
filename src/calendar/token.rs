use crate::config::OAuthClient;
use crate::utils::time::{expires_within, now_timestamp};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OAuth tokens held in the user's session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Whether a refresh is due given the provider's lead window.
    ///
    /// Tokens without an expiry or without a refresh token are never due.
    pub fn needs_refresh(&self, lead_secs: i64) -> bool {
        match (self.expires_at, &self.refresh_token) {
            (Some(expires_at), Some(_)) => expires_within(expires_at, now_timestamp(), lead_secs),
            _ => false,
        }
    }
}

/// Token endpoint response shared by Google and Microsoft
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Combine with an existing refresh token; providers often omit it on refresh
    pub fn into_token_set(self, previous_refresh: Option<&str>) -> TokenSet {
        let expires_in = self.expires_in.unwrap_or(3600);
        TokenSet {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Some(now_timestamp() + expires_in),
        }
    }
}

/// Run a refresh-token grant. Errors carry the raw cause for logging only.
pub async fn refresh_grant(
    client: &Client,
    token_url: &str,
    oauth: &OAuthClient,
    refresh_token: &str,
    scope: Option<&str>,
) -> Result<TokenSet, String> {
    let mut params = vec![
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    if let Some(scope) = scope {
        params.push(("scope", scope));
    }

    let response = post_token_form(client, token_url, &params).await?;
    Ok(response.into_token_set(Some(refresh_token)))
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    client: &Client,
    token_url: &str,
    oauth: &OAuthClient,
    code: &str,
    redirect_uri: &str,
    scope: Option<&str>,
) -> Result<TokenSet, String> {
    let mut params = vec![
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    if let Some(scope) = scope {
        params.push(("scope", scope));
    }

    let response = post_token_form(client, token_url, &params).await?;
    Ok(response.into_token_set(None))
}

async fn post_token_form(
    client: &Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, String> {
    let response = client
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| format!("Token request failed: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(format!("Token endpoint returned HTTP {} - {}", status, error_body));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| format!("Failed to parse token response: {}", e))
}
