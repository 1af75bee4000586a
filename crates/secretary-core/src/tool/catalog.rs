//! The fixed calendar tool catalog offered to the model.

use serde_json::json;

use crate::types::ToolDefinition;

pub const LIST_EVENTS: &str = "list_calendar_events";
pub const CREATE_EVENT: &str = "create_calendar_event";
pub const UPDATE_EVENT: &str = "update_calendar_event";
pub const DELETE_EVENT: &str = "delete_calendar_event";

/// All four calendar tools, in a stable order.
pub fn calendar_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: LIST_EVENTS.to_string(),
            description: "List events on the user's Google Calendar, ordered by start time."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "time_min": {
                        "type": "string",
                        "description": "Lower bound (inclusive) for event end time, ISO-8601 with offset, e.g. 2025-01-15T00:00:00+09:00"
                    },
                    "time_max": {
                        "type": "string",
                        "description": "Upper bound (exclusive) for event start time, ISO-8601 with offset"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of events to return (default 10)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: CREATE_EVENT.to_string(),
            description: "Create a new event on the user's Google Calendar.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string", "description": "Event title"},
                    "start_time": {"type": "string", "description": "Start, ISO-8601 with offset"},
                    "end_time": {"type": "string", "description": "End, ISO-8601 with offset"},
                    "description": {"type": "string", "description": "Event description"},
                    "location": {"type": "string", "description": "Event location"}
                },
                "required": ["summary", "start_time", "end_time"]
            }),
        },
        ToolDefinition {
            name: UPDATE_EVENT.to_string(),
            description: "Update fields of an existing event. Only the given fields change."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "event_id": {"type": "string", "description": "ID of the event to update"},
                    "summary": {"type": "string", "description": "New title"},
                    "start_time": {"type": "string", "description": "New start, ISO-8601 with offset"},
                    "end_time": {"type": "string", "description": "New end, ISO-8601 with offset"},
                    "description": {"type": "string", "description": "New description"},
                    "location": {"type": "string", "description": "New location"}
                },
                "required": ["event_id"]
            }),
        },
        ToolDefinition {
            name: DELETE_EVENT.to_string(),
            description: "Delete an event from the user's Google Calendar.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "event_id": {"type": "string", "description": "ID of the event to delete"}
                },
                "required": ["event_id"]
            }),
        },
    ]
}
