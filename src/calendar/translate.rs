//! Conversions between provider-native shapes and the canonical model.
//!
//! Google's event resource already matches the canonical shape, so the Google
//! half only drops fields the app does not use. Outlook (Microsoft Graph)
//! needs real field mapping plus two fixed lookup tables.

use super::models::{Attendee, Calendar, CalendarEvent, EventDateTime, EventPatch, ResponseStatus};
use serde::{Deserialize, Serialize};

/// Fallback calendar color
pub const DEFAULT_CALENDAR_COLOR: &str = "#039BE5";

const OUTLOOK_BODY_CONTENT_TYPE: &str = "HTML";
const OUTLOOK_ATTENDEE_TYPE: &str = "required";
const OUTLOOK_DEFAULT_TIME_ZONE: &str = "UTC";

// ---------------------------------------------------------------------------
// Google
// ---------------------------------------------------------------------------

/// Google Calendar event resource (only the fields we keep plus a few we drop)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_override: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub access_role: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCalendarList {
    #[serde(default)]
    pub items: Vec<GoogleCalendarListEntry>,
}

pub fn from_google(event: GoogleEvent) -> CalendarEvent {
    CalendarEvent {
        id: event.id.unwrap_or_default(),
        summary: event.summary.unwrap_or_default(),
        description: event.description,
        start: event.start.unwrap_or_default(),
        end: event.end.unwrap_or_default(),
        location: event.location,
        attendees: event.attendees.unwrap_or_default(),
        color_id: event.color_id,
    }
}

/// Provider assigns the id, so it is never sent
pub fn to_google(event: &CalendarEvent) -> GoogleEvent {
    GoogleEvent {
        id: None,
        summary: Some(event.summary.clone()),
        description: event.description.clone(),
        start: Some(event.start.clone()),
        end: Some(event.end.clone()),
        location: event.location.clone(),
        attendees: (!event.attendees.is_empty()).then(|| event.attendees.clone()),
        color_id: event.color_id.clone(),
        ..GoogleEvent::default()
    }
}

pub fn google_calendar(entry: GoogleCalendarListEntry) -> Calendar {
    Calendar {
        summary: entry.summary_override.unwrap_or(entry.summary),
        id: entry.id,
        background_color: entry.background_color,
        access_role: entry.access_role,
        primary: entry.primary,
    }
}

// ---------------------------------------------------------------------------
// Outlook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookItemBody {
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookDateTime {
    pub date_time: String,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookLocation {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlookEmailAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlookResponse {
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookAttendee {
    pub email_address: OutlookEmailAddress,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attendee_type: Option<String>,
    #[serde(default, skip_serializing)]
    pub status: Option<OutlookResponse>,
}

/// Microsoft Graph event resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookEvent {
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<OutlookItemBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<OutlookDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<OutlookDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<OutlookLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<OutlookAttendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct OutlookEventList {
    #[serde(default)]
    pub value: Vec<OutlookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookCalendar {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub hex_color: Option<String>,
    #[serde(default)]
    pub can_edit: Option<bool>,
    #[serde(default)]
    pub is_default_calendar: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct OutlookCalendarList {
    #[serde(default)]
    pub value: Vec<OutlookCalendar>,
}

/// Graph attendee response → canonical status. Unknown values need action.
pub fn response_status_from_outlook(response: &str) -> ResponseStatus {
    match response {
        "accepted" | "organizer" => ResponseStatus::Accepted,
        "declined" => ResponseStatus::Declined,
        "tentativelyAccepted" => ResponseStatus::Tentative,
        "notResponded" => ResponseStatus::NeedsAction,
        _ => ResponseStatus::NeedsAction,
    }
}

/// Graph calendar palette name → hex. Unknown and `auto` use the default.
pub fn outlook_color_to_hex(color: &str) -> &'static str {
    match color {
        "lightBlue" => "#4285F4",
        "lightGreen" => "#33B679",
        "lightOrange" => "#F4511E",
        "lightGray" => "#616161",
        "lightYellow" => "#F6BF26",
        "lightTeal" => "#009688",
        "lightPink" => "#E67C73",
        "lightBrown" => "#795548",
        "lightRed" => "#D50000",
        _ => DEFAULT_CALENDAR_COLOR,
    }
}

/// All-day dates are sent as midnight of that date with `isAllDay` set
fn to_outlook_time(time: &EventDateTime) -> OutlookDateTime {
    match &time.date {
        Some(date) => OutlookDateTime {
            date_time: format!("{}T00:00:00", date),
            time_zone: Some(
                time.time_zone
                    .clone()
                    .unwrap_or_else(|| OUTLOOK_DEFAULT_TIME_ZONE.to_string()),
            ),
        },
        None => OutlookDateTime {
            date_time: time.date_time.clone().unwrap_or_default(),
            time_zone: Some(
                time.time_zone
                    .clone()
                    .unwrap_or_else(|| OUTLOOK_DEFAULT_TIME_ZONE.to_string()),
            ),
        },
    }
}

fn from_outlook_time(time: OutlookDateTime, all_day: bool) -> EventDateTime {
    if all_day {
        let date: String = time.date_time.chars().take(10).collect();
        EventDateTime::all_day(date)
    } else {
        EventDateTime {
            date_time: Some(time.date_time),
            date: None,
            time_zone: time.time_zone,
        }
    }
}

fn to_outlook_attendees(attendees: &[Attendee]) -> Vec<OutlookAttendee> {
    attendees
        .iter()
        .map(|a| OutlookAttendee {
            email_address: OutlookEmailAddress {
                address: a.email.clone(),
                name: a.display_name.clone(),
            },
            attendee_type: Some(OUTLOOK_ATTENDEE_TYPE.to_string()),
            status: None,
        })
        .collect()
}

fn to_outlook_body(description: &str) -> OutlookItemBody {
    OutlookItemBody {
        content_type: OUTLOOK_BODY_CONTENT_TYPE.to_string(),
        content: description.to_string(),
    }
}

fn to_outlook_location(location: &str) -> OutlookLocation {
    OutlookLocation {
        display_name: location.to_string(),
    }
}

pub fn to_outlook(event: &CalendarEvent) -> OutlookEvent {
    OutlookEvent {
        id: None,
        subject: Some(event.summary.clone()),
        body: event.description.as_deref().map(to_outlook_body),
        start: Some(to_outlook_time(&event.start)),
        end: Some(to_outlook_time(&event.end)),
        location: event.location.as_deref().map(to_outlook_location),
        attendees: (!event.attendees.is_empty()).then(|| to_outlook_attendees(&event.attendees)),
        is_all_day: Some(event.is_all_day()),
    }
}

/// Translate only the supplied fields
pub fn patch_to_outlook(patch: &EventPatch) -> OutlookEvent {
    let is_all_day = patch
        .start
        .as_ref()
        .or(patch.end.as_ref())
        .map(EventDateTime::is_all_day);

    OutlookEvent {
        id: None,
        subject: patch.summary.clone(),
        body: patch.description.as_deref().map(to_outlook_body),
        start: patch.start.as_ref().map(to_outlook_time),
        end: patch.end.as_ref().map(to_outlook_time),
        location: patch.location.as_deref().map(to_outlook_location),
        attendees: patch.attendees.as_deref().map(to_outlook_attendees),
        is_all_day,
    }
}

pub fn from_outlook(event: OutlookEvent) -> CalendarEvent {
    let all_day = event.is_all_day.unwrap_or(false);

    CalendarEvent {
        id: event.id.unwrap_or_default(),
        summary: event.subject.unwrap_or_default(),
        description: event.body.map(|b| b.content),
        start: event
            .start
            .map(|t| from_outlook_time(t, all_day))
            .unwrap_or_default(),
        end: event
            .end
            .map(|t| from_outlook_time(t, all_day))
            .unwrap_or_default(),
        location: event.location.map(|l| l.display_name),
        attendees: event
            .attendees
            .unwrap_or_default()
            .into_iter()
            .map(|a| Attendee {
                email: a.email_address.address,
                display_name: a.email_address.name,
                response_status: Some(
                    a.status
                        .map(|s| response_status_from_outlook(&s.response))
                        .unwrap_or_default(),
                ),
            })
            .collect(),
        color_id: None,
    }
}

pub fn outlook_calendar(calendar: OutlookCalendar) -> Calendar {
    let primary = calendar.is_default_calendar.unwrap_or(false);
    let access_role = if primary {
        "owner"
    } else if calendar.can_edit.unwrap_or(false) {
        "writer"
    } else {
        "reader"
    };
    let background_color = calendar
        .hex_color
        .filter(|hex| !hex.is_empty())
        .unwrap_or_else(|| {
            outlook_color_to_hex(calendar.color.as_deref().unwrap_or("auto")).to_string()
        });

    Calendar {
        id: calendar.id,
        summary: calendar.name,
        background_color: Some(background_color),
        access_role: Some(access_role.to_string()),
        primary,
    }
}
