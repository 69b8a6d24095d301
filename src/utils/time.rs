use crate::calendar::models::EventDateTime;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Current time as a unix timestamp (seconds)
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Whether a token expiring at `expires_at` needs refreshing within `lead_secs`
pub fn expires_within(expires_at: i64, now: i64, lead_secs: i64) -> bool {
    expires_at - now <= lead_secs
}

/// Parse an IANA zone name, falling back to UTC
pub fn resolve_timezone(name: Option<&str>) -> Tz {
    name.and_then(|n| n.trim().parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Default event window handed to the chat prompt: a week back, a month ahead
pub fn default_chat_window(now: DateTime<Utc>) -> (String, String) {
    let start = now - Duration::days(7);
    let end = now + Duration::days(30);
    (start.to_rfc3339(), end.to_rfc3339())
}

/// UTC instant of a timed event boundary.
///
/// A `dateTime` with an offset stands on its own. A naive one is read in the
/// boundary's `timeZone`, or UTC when none is given. Unknown zones and local
/// times skipped by a DST change give `None`.
pub fn resolve_instant(time: &EventDateTime) -> Option<DateTime<Utc>> {
    let value = time.date_time.as_deref()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()?;
    let tz = match time.time_zone.as_deref() {
        Some(name) => name.trim().parse::<Tz>().ok()?,
        None => Tz::UTC,
    };
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// True only when both boundaries resolve to instants and end is earlier
pub fn end_precedes_start(start: &EventDateTime, end: &EventDateTime) -> bool {
    match (resolve_instant(start), resolve_instant(end)) {
        (Some(s), Some(e)) => e < s,
        _ => false,
    }
}

/// Human readable start/end for prompts
pub fn format_event_time(time: &EventDateTime) -> String {
    match (&time.date, &time.date_time) {
        (Some(date), _) => format!("{} (all day)", date),
        (None, Some(date_time)) => match &time.time_zone {
            Some(tz) => format!("{} ({})", date_time, tz),
            None => date_time.clone(),
        },
        (None, None) => "unknown".to_string(),
    }
}

/// Local "now" line used in the system prompt
pub fn describe_now(now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    format!(
        "{} ({}, UTC offset {})",
        local.format("%A, %Y-%m-%d %H:%M"),
        tz.name(),
        local.format("%:z")
    )
}
