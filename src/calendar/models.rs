use crate::error::{bad_request, AppResult};
use crate::utils::time::end_precedes_start;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Title shown for events without a summary
pub const UNTITLED: &str = "Untitled";

/// Start or end of an event.
///
/// Timed events carry `dateTime` (+ `timeZone`), all-day events carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// ISO-8601 date-time, e.g. 2025-03-14T15:00:00
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// ISO-8601 date (YYYY-MM-DD) for all-day events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// IANA time zone name, e.g. Europe/Helsinki
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn timed(date_time: impl Into<String>, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some(time_zone.into()),
        }
    }

    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date_time: None,
            date: Some(date.into()),
            time_zone: None,
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.date.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.date_time.is_none() && self.date.is_none()
    }
}

/// Attendee reply state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    #[default]
    NeedsAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<ResponseStatus>,
}

/// Provider independent calendar event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Assigned by the provider
    #[serde(default)]
    #[schemars(skip)]
    pub id: String,
    /// Event title
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub color_id: Option<String>,
}

impl CalendarEvent {
    /// Summary, or "Untitled" when empty
    pub fn display_title(&self) -> &str {
        if self.summary.trim().is_empty() {
            UNTITLED
        } else {
            &self.summary
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Reject events that cannot be created
    pub fn validate_for_create(&self) -> AppResult<()> {
        if self.summary.trim().is_empty() {
            return Err(bad_request("Event summary is required"));
        }
        if self.start.is_empty() || self.end.is_empty() {
            return Err(bad_request("Event start and end are required"));
        }
        if end_precedes_start(&self.start, &self.end) {
            return Err(bad_request("Event end must not be before its start"));
        }
        Ok(())
    }
}

/// Partial update: only the supplied fields change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    /// New event title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self == &EventPatch::default()
    }
}

/// Lightweight calendar description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_role: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

fn default_max_results() -> usize {
    100
}

/// Parameters for listing events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub time_min: Option<String>,
    #[serde(default)]
    pub time_max: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            calendar_id: None,
            time_min: None,
            time_max: None,
            max_results: default_max_results(),
        }
    }
}

impl EventQuery {
    pub fn between(time_min: impl Into<String>, time_max: impl Into<String>) -> Self {
        Self {
            time_min: Some(time_min.into()),
            time_max: Some(time_max.into()),
            ..Self::default()
        }
    }
}
