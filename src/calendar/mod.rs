pub mod factory;
pub mod google;
pub mod models;
pub mod outlook;
pub mod token;
pub mod translate;

pub use factory::ProviderFactory;
pub use google::GoogleCalendarProvider;
pub use models::{Attendee, Calendar, CalendarEvent, EventDateTime, EventPatch, EventQuery, ResponseStatus};
pub use outlook::OutlookCalendarProvider;
pub use token::TokenSet;

use crate::error::{provider_error, AppResult, Error};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::error;
use url::Url;

pub const FETCH_CALENDARS_FAILED: &str = "Failed to fetch calendars";
pub const FETCH_EVENTS_FAILED: &str = "Failed to fetch events";
pub const CREATE_EVENT_FAILED: &str = "Failed to create event";
pub const UPDATE_EVENT_FAILED: &str = "Failed to update event";
pub const DELETE_EVENT_FAILED: &str = "Failed to delete event";
pub const REFRESH_TOKEN_FAILED: &str = "Failed to refresh token";

/// Calendar id every provider understands as "the user's main calendar"
pub const PRIMARY_CALENDAR: &str = "primary";

/// Common capability set of a calendar backend.
///
/// Implementations never mutate themselves. A refresh hands back a new
/// [`TokenSet`] and the caller builds a fresh provider from it.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Stable provider tag, `google` or `outlook`
    fn provider_name(&self) -> &'static str;

    /// Tokens this instance authenticates with
    fn tokens(&self) -> &TokenSet;

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>>;

    /// Events ordered by start time, at most `query.max_results` of them
    async fn get_events(&self, query: &EventQuery) -> AppResult<Vec<CalendarEvent>>;

    async fn create_event(
        &self,
        calendar_id: Option<&str>,
        event: &CalendarEvent,
    ) -> AppResult<CalendarEvent>;

    /// Only the fields present in `patch` change
    async fn update_event(
        &self,
        calendar_id: Option<&str>,
        event_id: &str,
        patch: &EventPatch,
    ) -> AppResult<CalendarEvent>;

    async fn delete_event(&self, calendar_id: Option<&str>, event_id: &str) -> AppResult<()>;

    /// The current tokens, or new ones when expiry falls inside the lead window
    async fn refresh_token_if_needed(&self) -> AppResult<TokenSet>;
}

/// Supported calendar backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Outlook,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Google, ProviderKind::Outlook];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Outlook => "outlook",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "outlook" => Ok(ProviderKind::Outlook),
            other => Err(Error::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Log the real cause and replace it with the operation's fixed message
pub(crate) fn wrap_provider_error(provider: &str, message: &str, cause: impl fmt::Display) -> Error {
    error!("{} provider: {}: {}", provider, message, cause);
    provider_error(message)
}

/// Append path segments to an API base URL
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("Invalid API base URL {}: {}", base, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("API base URL cannot take a path: {}", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a request and decode a successful JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, String> {
    let response = send_checked(request).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| format!("Failed to parse response: {}", e))
}

/// Send a request whose successful body is ignored
pub(crate) async fn send_empty(request: RequestBuilder) -> Result<(), String> {
    send_checked(request).await.map(|_| ())
}

async fn send_checked(request: RequestBuilder) -> Result<reqwest::Response, String> {
    let response = request
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(format!("HTTP {} - {}", status, error_body));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("outlook".parse::<ProviderKind>().unwrap(), ProviderKind::Outlook);
        assert!(matches!(
            "azure".parse::<ProviderKind>(),
            Err(Error::UnsupportedProvider(tag)) if tag == "azure"
        ));
    }

    #[test]
    fn test_endpoint() {
        let url = endpoint(
            "https://www.googleapis.com/calendar/v3",
            &["calendars", "team@example.com", "events"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team@example.com/events"
        );

        // Segments are escaped and a bare host works
        let url = endpoint("http://127.0.0.1:8080/", &["me", "calendars", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/me/calendars/a%2Fb");
    }
}
