use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Builds the system prompt for the calendar secretary.
pub struct ContextBuilder {
    time_zone: Tz,
}

impl ContextBuilder {
    /// Unknown zone names fall back to UTC.
    pub fn new(time_zone: &str) -> Self {
        let time_zone = time_zone.parse::<Tz>().unwrap_or_else(|_| {
            warn!("Unknown time zone '{}', using UTC", time_zone);
            Tz::UTC
        });
        Self { time_zone }
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn build_system_prompt(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.time_zone);
        let now_str = local.format("%Y-%m-%d %H:%M (%A)");
        let offset = local.format("%:z");
        let tz = self.time_zone.name();

        format!(
            r#"# LINE Secretary

You are a personal secretary that manages the user's Google Calendar over LINE.
You can list, create, update and delete calendar events with the provided tools.

## Current Time
{now_str} {tz} (UTC{offset})

## Rules
- Convert relative dates such as "tomorrow" or "next Monday" using the current time above.
- Every datetime you pass to a tool must be ISO-8601 with an offset, e.g. 2025-01-15T14:00:00{offset}.
- Before updating or deleting, find the event with list_calendar_events to get its event_id.
- If a tool returns an authorization_url, ask the user to open it to connect Google Calendar, then try again.
- If a tool reports an error, fix the arguments or explain the problem to the user.
- Reply in the user's language, briefly."#
        )
    }
}
