use super::models::{Calendar, CalendarEvent, EventPatch, EventQuery};
use super::token::{refresh_grant, TokenSet};
use super::translate::{
    from_google, google_calendar, to_google, GoogleCalendarList, GoogleEvent, GoogleEventList,
};
use super::{
    endpoint, send_empty, send_json, wrap_provider_error, CalendarProvider, CREATE_EVENT_FAILED,
    DELETE_EVENT_FAILED, FETCH_CALENDARS_FAILED, FETCH_EVENTS_FAILED, PRIMARY_CALENDAR,
    REFRESH_TOKEN_FAILED, UPDATE_EVENT_FAILED,
};
use crate::config::ProviderConfig;
use crate::error::AppResult;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use tracing::{debug, info};
use url::Url;

const PROVIDER: &str = "google";

/// Refresh when the access token expires within a minute
pub const GOOGLE_REFRESH_LEAD_SECS: i64 = 60;

/// Google Calendar REST v3 backend
pub struct GoogleCalendarProvider {
    tokens: TokenSet,
    config: ProviderConfig,
}

impl GoogleCalendarProvider {
    pub fn new(tokens: TokenSet, config: ProviderConfig) -> Self {
        Self { tokens, config }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, String> {
        endpoint(&self.config.google_api_base, segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.tokens.access_token)
    }

    async fn fetch_calendars(&self) -> Result<Vec<Calendar>, String> {
        let url = self.url(&["users", "me", "calendarList"])?;
        let list: GoogleCalendarList = send_json(self.authorized(self.config.http.get(url))).await?;
        Ok(list.items.into_iter().map(google_calendar).collect())
    }

    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>, String> {
        let calendar_id = query.calendar_id.as_deref().unwrap_or(PRIMARY_CALENDAR);
        let mut url = self.url(&["calendars", calendar_id, "events"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime")
                .append_pair("maxResults", &query.max_results.to_string());
            if let Some(time_min) = &query.time_min {
                pairs.append_pair("timeMin", time_min);
            }
            if let Some(time_max) = &query.time_max {
                pairs.append_pair("timeMax", time_max);
            }
        }

        let list: GoogleEventList = send_json(self.authorized(self.config.http.get(url))).await?;
        debug!("Fetched {} Google events from {}", list.items.len(), calendar_id);

        Ok(list
            .items
            .into_iter()
            .take(query.max_results)
            .map(from_google)
            .collect())
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent, String> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let request = self.config.http.post(url).json(&to_google(event));
        let created: GoogleEvent = send_json(self.authorized(request)).await?;
        Ok(from_google(created))
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, String> {
        // The canonical patch already has Google's field names
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let request = self.config.http.patch(url).json(patch);
        let updated: GoogleEvent = send_json(self.authorized(request)).await?;
        Ok(from_google(updated))
    }

    async fn remove_event(&self, calendar_id: &str, event_id: &str) -> Result<(), String> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        send_empty(self.authorized(self.config.http.delete(url))).await
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    async fn list_calendars(&self) -> AppResult<Vec<Calendar>> {
        self.fetch_calendars()
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, FETCH_CALENDARS_FAILED, e))
    }

    async fn get_events(&self, query: &EventQuery) -> AppResult<Vec<CalendarEvent>> {
        self.fetch_events(query)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, FETCH_EVENTS_FAILED, e))
    }

    async fn create_event(
        &self,
        calendar_id: Option<&str>,
        event: &CalendarEvent,
    ) -> AppResult<CalendarEvent> {
        event.validate_for_create()?;
        self.insert_event(calendar_id.unwrap_or(PRIMARY_CALENDAR), event)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, CREATE_EVENT_FAILED, e))
    }

    async fn update_event(
        &self,
        calendar_id: Option<&str>,
        event_id: &str,
        patch: &EventPatch,
    ) -> AppResult<CalendarEvent> {
        self.patch_event(calendar_id.unwrap_or(PRIMARY_CALENDAR), event_id, patch)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, UPDATE_EVENT_FAILED, e))
    }

    async fn delete_event(&self, calendar_id: Option<&str>, event_id: &str) -> AppResult<()> {
        self.remove_event(calendar_id.unwrap_or(PRIMARY_CALENDAR), event_id)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, DELETE_EVENT_FAILED, e))
    }

    async fn refresh_token_if_needed(&self) -> AppResult<TokenSet> {
        if !self.tokens.needs_refresh(GOOGLE_REFRESH_LEAD_SECS) {
            return Ok(self.tokens.clone());
        }
        let Some(refresh_token) = self.tokens.refresh_token.as_deref() else {
            return Ok(self.tokens.clone());
        };

        let tokens = refresh_grant(
            &self.config.http,
            &self.config.google_token_url,
            &self.config.google,
            refresh_token,
            None,
        )
        .await
        .map_err(|e| wrap_provider_error(PROVIDER, REFRESH_TOKEN_FAILED, e))?;

        info!("Refreshed Google access token");
        Ok(tokens)
    }
}
