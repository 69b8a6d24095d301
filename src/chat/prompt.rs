use crate::calendar::CalendarEvent;
use crate::utils::time::{describe_now, format_event_time};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Write;

/// One line per event, IDs included so the model can reference them
pub fn format_event_line(event: &CalendarEvent) -> String {
    let mut line = format!(
        "- [ID: {}] {} | {} → {}",
        event.id,
        event.display_title(),
        format_event_time(&event.start),
        format_event_time(&event.end)
    );
    if let Some(location) = event.location.as_deref().filter(|l| !l.trim().is_empty()) {
        let _ = write!(line, " | {}", location);
    }
    line
}

/// System prompt for a chat turn
pub fn build_system_prompt(events: &[CalendarEvent], tz: Tz, now: DateTime<Utc>) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a helpful calendar assistant. You can read the user's calendar and \
         create, update or delete events with the provided tools.\n\n",
    );
    let _ = writeln!(prompt, "Current date and time: {}", describe_now(now, tz));
    let _ = writeln!(prompt, "User timezone: {}", tz.name());
    prompt.push('\n');

    if events.is_empty() {
        prompt.push_str("The user's calendar has no events in the current window.\n");
    } else {
        prompt.push_str("The user's calendar events:\n");
        for event in events {
            prompt.push_str(&format_event_line(event));
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nInstructions:\n\
         - To change the calendar, call the tools instead of describing the change.\n\
         - Refer to existing events only by the IDs listed above.\n\
         - Interpret relative dates and times in the user's timezone and pass that \
         timezone as timeZone on timed events.\n\
         - Use date (YYYY-MM-DD) on start and end for all-day events.\n\
         - Answer questions about the schedule directly from the list above.\n",
    );

    prompt
}
