mod common;

use calchat::calendar::{
    CalendarEvent, CalendarProvider, EventDateTime, EventPatch, EventQuery, GoogleCalendarProvider,
    OutlookCalendarProvider, ProviderFactory, TokenSet,
};
use calchat::config::{OAuthClient, ProviderConfig};
use calchat::error::Error;
use chrono::Utc;
use common::timed_event;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        google: OAuthClient {
            client_id: "google-client".to_string(),
            client_secret: "google-secret".to_string(),
        },
        microsoft: OAuthClient {
            client_id: "ms-client".to_string(),
            client_secret: "ms-secret".to_string(),
        },
        google_api_base: server.uri(),
        graph_api_base: server.uri(),
        google_token_url: format!("{}/token", server.uri()),
        microsoft_token_url: format!("{}/token", server.uri()),
        ..ProviderConfig::default()
    }
}

fn tokens_expiring_in(secs: i64) -> TokenSet {
    TokenSet {
        access_token: "access-token".to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expires_at: Some(Utc::now().timestamp() + secs),
    }
}

#[test]
fn test_factory_builds_each_provider() {
    let config = ProviderConfig::default();
    let google = ProviderFactory::create_provider("google", TokenSet::new("a"), &config).unwrap();
    assert_eq!(google.provider_name(), "google");
    assert_eq!(google.tokens().access_token, "a");

    let outlook = ProviderFactory::create_provider("outlook", TokenSet::new("b"), &config).unwrap();
    assert_eq!(outlook.provider_name(), "outlook");

    match ProviderFactory::create_provider("azure", TokenSet::new("c"), &config) {
        Err(Error::UnsupportedProvider(tag)) => assert_eq!(tag, "azure"),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("azure must not be supported"),
    }
}

#[tokio::test]
async fn test_google_lists_calendars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "primary-id", "summary": "ada@example.com", "primary": true, "accessRole": "owner" },
                { "id": "team", "summary": "Team", "summaryOverride": "Work" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));
    let calendars = provider.list_calendars().await.unwrap();

    assert_eq!(calendars.len(), 2);
    assert!(calendars[0].primary);
    assert_eq!(calendars[1].summary, "Work");
}

#[tokio::test]
async fn test_google_get_events_caps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("maxResults", "2"))
        .and(query_param("timeMin", "2025-03-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "1", "summary": "One", "start": { "dateTime": "2025-03-01T09:00:00Z" }, "end": { "dateTime": "2025-03-01T10:00:00Z" } },
                { "id": "2", "summary": "Two", "start": { "date": "2025-03-02" }, "end": { "date": "2025-03-03" } },
                { "id": "3", "summary": "Three", "start": { "date": "2025-03-04" }, "end": { "date": "2025-03-05" } }
            ]
        })))
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));
    let query = EventQuery {
        time_min: Some("2025-03-01T00:00:00Z".to_string()),
        max_results: 2,
        ..EventQuery::default()
    };
    let events = provider.get_events(&query).await.unwrap();

    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert!(events[1].is_all_day());
}

#[tokio::test]
async fn test_google_errors_hide_the_cause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));

    let err = provider.get_events(&EventQuery::default()).await.unwrap_err();
    assert!(matches!(&err, Error::Provider(msg) if msg == "Failed to fetch events"));
    assert!(!err.to_string().contains("exploded"));

    let err = provider.delete_event(None, "gone").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to delete event");
}

#[tokio::test]
async fn test_google_create_and_patch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_json(json!({
            "summary": "Dentist",
            "start": { "dateTime": "2025-03-14T15:00:00", "timeZone": "UTC" },
            "end": { "dateTime": "2025-03-14T16:00:00", "timeZone": "UTC" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-id",
            "status": "confirmed",
            "summary": "Dentist",
            "start": { "dateTime": "2025-03-14T15:00:00Z" },
            "end": { "dateTime": "2025-03-14T16:00:00Z" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/calendars/work/events/new-id"))
        .and(body_json(json!({ "summary": "Dentist (moved)" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-id",
            "summary": "Dentist (moved)"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));

    let created = provider
        .create_event(
            None,
            &timed_event("Dentist", "2025-03-14T15:00:00", "2025-03-14T16:00:00"),
        )
        .await
        .unwrap();
    assert_eq!(created.id, "new-id");

    let patch = EventPatch {
        summary: Some("Dentist (moved)".to_string()),
        ..EventPatch::default()
    };
    let updated = provider
        .update_event(Some("work"), "new-id", &patch)
        .await
        .unwrap();
    assert_eq!(updated.summary, "Dentist (moved)");
}

#[tokio::test]
async fn test_create_rejects_incomplete_events_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));
    let event = CalendarEvent {
        summary: "No times".to_string(),
        ..CalendarEvent::default()
    };
    let err = provider.create_event(None, &event).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn test_google_refresh_inside_lead_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(tokens_expiring_in(30), provider_config(&server));
    let tokens = provider.refresh_token_if_needed().await.unwrap();

    assert_eq!(tokens.access_token, "fresh-access");
    // Google omits the refresh token on refresh; the old one is kept
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-token"));
    assert!(tokens.expires_at.unwrap() > Utc::now().timestamp() + 3000);
    // The provider itself is unchanged
    assert_eq!(provider.tokens().access_token, "access-token");
}

#[tokio::test]
async fn test_refresh_not_due_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Outside Google's one minute window
    let google = GoogleCalendarProvider::new(tokens_expiring_in(120), provider_config(&server));
    assert_eq!(google.refresh_token_if_needed().await.unwrap(), *google.tokens());

    // No refresh token at all
    let outlook = OutlookCalendarProvider::new(
        TokenSet {
            refresh_token: None,
            ..tokens_expiring_in(10)
        },
        provider_config(&server),
    );
    assert_eq!(outlook.refresh_token_if_needed().await.unwrap(), *outlook.tokens());
}

#[tokio::test]
async fn test_refresh_failure_is_a_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let provider = GoogleCalendarProvider::new(tokens_expiring_in(0), provider_config(&server));
    let err = provider.refresh_token_if_needed().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to refresh token");
}

#[tokio::test]
async fn test_outlook_refresh_uses_wider_window_and_scope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_id=ms-client"))
        .and(body_string_contains("scope=offline_access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-access",
            "refresh_token": "rotated-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Four minutes left: inside Outlook's five minute window
    let provider = OutlookCalendarProvider::new(tokens_expiring_in(240), provider_config(&server));
    let tokens = provider.refresh_token_if_needed().await.unwrap();

    assert_eq!(tokens.access_token, "graph-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rotated-refresh"));
}

#[tokio::test]
async fn test_outlook_calendar_view_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/calendar/calendarView"))
        .and(query_param("startDateTime", "2025-03-01T00:00:00Z"))
        .and(query_param("endDateTime", "2025-03-08T00:00:00Z"))
        .and(query_param("$top", "50"))
        .and(header("prefer", "outlook.timezone=\"UTC\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "id": "AAMk-1",
                    "subject": "Offsite",
                    "isAllDay": true,
                    "start": { "dateTime": "2025-03-03T00:00:00.0000000", "timeZone": "UTC" },
                    "end": { "dateTime": "2025-03-04T00:00:00.0000000", "timeZone": "UTC" }
                },
                {
                    "id": "AAMk-2",
                    "subject": "1:1",
                    "isAllDay": false,
                    "start": { "dateTime": "2025-03-05T10:00:00.0000000", "timeZone": "UTC" },
                    "end": { "dateTime": "2025-03-05T10:30:00.0000000", "timeZone": "UTC" },
                    "location": { "displayName": "Teams" }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OutlookCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));
    let query = EventQuery {
        max_results: 50,
        ..EventQuery::between("2025-03-01T00:00:00Z", "2025-03-08T00:00:00Z")
    };
    let events = provider.get_events(&query).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].start, EventDateTime::all_day("2025-03-03"));
    assert_eq!(events[1].summary, "1:1");
    assert_eq!(events[1].location.as_deref(), Some("Teams"));
}

#[tokio::test]
async fn test_outlook_writes_target_the_right_calendar() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/calendar/events"))
        .and(wiremock::matchers::body_partial_json(json!({
            "subject": "Planning",
            "isAllDay": false,
            "start": { "dateTime": "2025-03-14T15:00:00", "timeZone": "UTC" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "AAMk-new",
            "subject": "Planning",
            "isAllDay": false,
            "start": { "dateTime": "2025-03-14T15:00:00.0000000", "timeZone": "UTC" },
            "end": { "dateTime": "2025-03-14T16:00:00.0000000", "timeZone": "UTC" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/me/calendars/shared-cal/events/AAMk-old"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/me/calendar/events/AAMk-new"))
        .and(body_json(json!({ "location": { "displayName": "Room 2" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "AAMk-new",
            "subject": "Planning",
            "location": { "displayName": "Room 2" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OutlookCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));

    let created = provider
        .create_event(
            Some("primary"),
            &timed_event("Planning", "2025-03-14T15:00:00", "2025-03-14T16:00:00"),
        )
        .await
        .unwrap();
    assert_eq!(created.id, "AAMk-new");

    provider
        .delete_event(Some("shared-cal"), "AAMk-old")
        .await
        .unwrap();

    let patch = EventPatch {
        location: Some("Room 2".to_string()),
        ..EventPatch::default()
    };
    let updated = provider.update_event(None, "AAMk-new", &patch).await.unwrap();
    assert_eq!(updated.location.as_deref(), Some("Room 2"));
}

#[tokio::test]
async fn test_outlook_list_calendars_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/calendars"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let provider = OutlookCalendarProvider::new(TokenSet::new("access-token"), provider_config(&server));
    let err = provider.list_calendars().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch calendars");
}
