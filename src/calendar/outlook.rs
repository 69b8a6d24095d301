use super::models::{Calendar, CalendarEvent, EventPatch, EventQuery};
use super::token::{refresh_grant, TokenSet};
use super::translate::{
    from_outlook, outlook_calendar, patch_to_outlook, to_outlook, OutlookCalendarList,
    OutlookEvent, OutlookEventList,
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

const PROVIDER: &str = "outlook";

/// Outlook refreshes five minutes ahead of expiry
pub const OUTLOOK_REFRESH_LEAD_SECS: i64 = 300;

/// Scope requested when refreshing Microsoft tokens
pub const OUTLOOK_REFRESH_SCOPE: &str = "offline_access Calendars.ReadWrite User.Read";

/// Ask Graph to return event times in UTC
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

/// Microsoft Graph calendar backend
pub struct OutlookCalendarProvider {
    tokens: TokenSet,
    config: ProviderConfig,
}

/// Path of a calendar below the Graph base
fn calendar_segments(calendar_id: Option<&str>) -> Vec<&str> {
    match calendar_id {
        None | Some(PRIMARY_CALENDAR) => vec!["me", "calendar"],
        Some(id) => vec!["me", "calendars", id],
    }
}

/// `$filter` for the plain events listing when the window is open on one side
fn events_filter(query: &EventQuery) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(time_min) = &query.time_min {
        clauses.push(format!("start/dateTime ge '{}'", time_min));
    }
    if let Some(time_max) = &query.time_max {
        clauses.push(format!("end/dateTime le '{}'", time_max));
    }
    (!clauses.is_empty()).then(|| clauses.join(" and "))
}

impl OutlookCalendarProvider {
    pub fn new(tokens: TokenSet, config: ProviderConfig) -> Self {
        Self { tokens, config }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, String> {
        endpoint(&self.config.graph_api_base, segments)
    }

    fn event_url(&self, calendar_id: Option<&str>, event_id: Option<&str>) -> Result<Url, String> {
        let mut segments = calendar_segments(calendar_id);
        segments.push("events");
        if let Some(event_id) = event_id {
            segments.push(event_id);
        }
        self.url(&segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.tokens.access_token)
            .header("Prefer", PREFER_UTC)
    }

    async fn fetch_calendars(&self) -> Result<Vec<Calendar>, String> {
        let url = self.url(&["me", "calendars"])?;
        let list: OutlookCalendarList =
            send_json(self.authorized(self.config.http.get(url))).await?;
        Ok(list.value.into_iter().map(outlook_calendar).collect())
    }

    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>, String> {
        let mut segments = calendar_segments(query.calendar_id.as_deref());

        let url = match (&query.time_min, &query.time_max) {
            // calendarView expands recurrences but needs both ends of the window
            (Some(time_min), Some(time_max)) => {
                segments.push("calendarView");
                let mut url = self.url(&segments)?;
                url.query_pairs_mut()
                    .append_pair("startDateTime", time_min)
                    .append_pair("endDateTime", time_max)
                    .append_pair("$orderby", "start/dateTime")
                    .append_pair("$top", &query.max_results.to_string());
                url
            }
            _ => {
                segments.push("events");
                let mut url = self.url(&segments)?;
                {
                    let mut pairs = url.query_pairs_mut();
                    pairs
                        .append_pair("$orderby", "start/dateTime")
                        .append_pair("$top", &query.max_results.to_string());
                    if let Some(filter) = events_filter(query) {
                        pairs.append_pair("$filter", &filter);
                    }
                }
                url
            }
        };

        let list: OutlookEventList = send_json(self.authorized(self.config.http.get(url))).await?;
        debug!("Fetched {} Outlook events", list.value.len());

        Ok(list
            .value
            .into_iter()
            .take(query.max_results)
            .map(from_outlook)
            .collect())
    }

    async fn insert_event(
        &self,
        calendar_id: Option<&str>,
        event: &CalendarEvent,
    ) -> Result<CalendarEvent, String> {
        let url = self.event_url(calendar_id, None)?;
        let request = self.config.http.post(url).json(&to_outlook(event));
        let created: OutlookEvent = send_json(self.authorized(request)).await?;
        Ok(from_outlook(created))
    }

    async fn patch_event(
        &self,
        calendar_id: Option<&str>,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, String> {
        let url = self.event_url(calendar_id, Some(event_id))?;
        let request = self.config.http.patch(url).json(&patch_to_outlook(patch));
        let updated: OutlookEvent = send_json(self.authorized(request)).await?;
        Ok(from_outlook(updated))
    }

    async fn remove_event(&self, calendar_id: Option<&str>, event_id: &str) -> Result<(), String> {
        let url = self.event_url(calendar_id, Some(event_id))?;
        send_empty(self.authorized(self.config.http.delete(url))).await
    }
}

#[async_trait]
impl CalendarProvider for OutlookCalendarProvider {
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
        self.insert_event(calendar_id, event)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, CREATE_EVENT_FAILED, e))
    }

    async fn update_event(
        &self,
        calendar_id: Option<&str>,
        event_id: &str,
        patch: &EventPatch,
    ) -> AppResult<CalendarEvent> {
        self.patch_event(calendar_id, event_id, patch)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, UPDATE_EVENT_FAILED, e))
    }

    async fn delete_event(&self, calendar_id: Option<&str>, event_id: &str) -> AppResult<()> {
        self.remove_event(calendar_id, event_id)
            .await
            .map_err(|e| wrap_provider_error(PROVIDER, DELETE_EVENT_FAILED, e))
    }

    async fn refresh_token_if_needed(&self) -> AppResult<TokenSet> {
        if !self.tokens.needs_refresh(OUTLOOK_REFRESH_LEAD_SECS) {
            return Ok(self.tokens.clone());
        }
        let Some(refresh_token) = self.tokens.refresh_token.as_deref() else {
            return Ok(self.tokens.clone());
        };

        let tokens = refresh_grant(
            &self.config.http,
            &self.config.microsoft_token_url,
            &self.config.microsoft,
            refresh_token,
            Some(OUTLOOK_REFRESH_SCOPE),
        )
        .await
        .map_err(|e| wrap_provider_error(PROVIDER, REFRESH_TOKEN_FAILED, e))?;

        info!("Refreshed Microsoft access token");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_segments() {
        assert_eq!(calendar_segments(None), vec!["me", "calendar"]);
        assert_eq!(calendar_segments(Some("primary")), vec!["me", "calendar"]);
        assert_eq!(calendar_segments(Some("AAMk=")), vec!["me", "calendars", "AAMk="]);
    }

    #[test]
    fn test_events_filter() {
        assert_eq!(events_filter(&EventQuery::default()), None);

        let query = EventQuery {
            time_min: Some("2024-05-01T00:00:00Z".to_string()),
            ..EventQuery::default()
        };
        assert_eq!(
            events_filter(&query).as_deref(),
            Some("start/dateTime ge '2024-05-01T00:00:00Z'")
        );
    }
}
