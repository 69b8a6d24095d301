//! Calendar tools offered to the model and their execution against a provider

use super::types::ToolCall;
use crate::calendar::{CalendarEvent, CalendarProvider, EventPatch};
use crate::error::{AppResult, Error};
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const CREATE_CALENDAR_EVENT: &str = "create_calendar_event";
pub const UPDATE_CALENDAR_EVENT: &str = "update_calendar_event";
pub const DELETE_CALENDAR_EVENTS: &str = "delete_calendar_events";

/// Arguments of `create_calendar_event`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventsArgs {
    /// Events to create
    pub events: Vec<CalendarEvent>,
}

/// One entry of `update_calendar_event`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    /// ID of the event to change, exactly as listed in the calendar context
    pub event_id: String,
    #[serde(flatten)]
    pub patch: EventPatch,
}

/// Arguments of `update_calendar_event`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventsArgs {
    /// Updates to apply; only the given fields change
    pub updates: Vec<EventUpdate>,
}

/// Arguments of `delete_calendar_events`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEventsArgs {
    /// IDs of the events to delete
    pub event_ids: Vec<String>,
}

/// The declared calendar tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarTool {
    CreateEvents,
    UpdateEvents,
    DeleteEvents,
}

impl CalendarTool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CREATE_CALENDAR_EVENT => Some(CalendarTool::CreateEvents),
            UPDATE_CALENDAR_EVENT => Some(CalendarTool::UpdateEvents),
            DELETE_CALENDAR_EVENTS => Some(CalendarTool::DeleteEvents),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CalendarTool::CreateEvents => CREATE_CALENDAR_EVENT,
            CalendarTool::UpdateEvents => UPDATE_CALENDAR_EVENT,
            CalendarTool::DeleteEvents => DELETE_CALENDAR_EVENTS,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            CalendarTool::CreateEvents => {
                "Create one or more calendar events. Use ISO-8601 dateTime with a timeZone for timed events, or date (YYYY-MM-DD) for all-day events."
            }
            CalendarTool::UpdateEvents => {
                "Update one or more existing calendar events. Each update needs the eventId from the calendar context plus the fields to change."
            }
            CalendarTool::DeleteEvents => {
                "Delete one or more calendar events by their eventId from the calendar context."
            }
        }
    }

    fn parameters(&self) -> Value {
        match self {
            CalendarTool::CreateEvents => parameters_schema::<CreateEventsArgs>(),
            CalendarTool::UpdateEvents => parameters_schema::<UpdateEventsArgs>(),
            CalendarTool::DeleteEvents => parameters_schema::<DeleteEventsArgs>(),
        }
    }

    /// Function-calling definition in the OpenAI `tools` format
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

/// All tool definitions sent with the first model turn
pub fn tool_definitions() -> Vec<Value> {
    [
        CalendarTool::CreateEvents,
        CalendarTool::UpdateEvents,
        CalendarTool::DeleteEvents,
    ]
    .iter()
    .map(CalendarTool::definition)
    .collect()
}

/// Inline JSON schema of an argument type, without root metadata
fn parameters_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_add_null_type = false;
    });
    let schema = settings.into_generator().into_root_schema_for::<T>();

    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.remove("definitions");
    }
    value
}

/// Result of one tool call as reported back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Items applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(count: usize) -> Self {
        Self {
            success: true,
            count: Some(count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            count: None,
            error: Some(error.into()),
        }
    }

    pub fn to_content(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"success":false,"error":"Unserializable tool result"}"#.to_string())
    }
}

/// Outcome of executing one requested tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    pub result: ToolResult,
    /// False for calls that never reached the provider
    pub attempted: bool,
}

fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> Result<T, String> {
    let raw = if call.function.arguments.trim().is_empty() {
        "{}"
    } else {
        call.function.arguments.as_str()
    };
    serde_json::from_str(raw)
        .map_err(|e| format!("Invalid arguments for {}: {}", call.function.name, e))
}

/// Apply items one by one, stopping at the first failure
async fn apply_each<I, F, Fut>(items: I, mut apply: F) -> ToolResult
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: std::future::Future<Output = AppResult<()>>,
{
    let mut applied = 0;
    for item in items {
        if let Err(e) = apply(item).await {
            let err = Error::ToolExecution(e.to_string());
            warn!("{} (after {} applied)", err, applied);
            return ToolResult {
                success: false,
                count: (applied > 0).then_some(applied),
                error: Some(err.to_string()),
            };
        }
        applied += 1;
    }
    ToolResult::ok(applied)
}

/// Run one tool call against the provider. Failures stay inside the result.
pub async fn execute_tool_call(provider: &dyn CalendarProvider, call: &ToolCall) -> ExecutedCall {
    let Some(tool) = CalendarTool::from_name(&call.function.name) else {
        warn!("Model requested unknown tool {:?}", call.function.name);
        return ExecutedCall {
            result: ToolResult::failed(format!("Unknown tool: {}", call.function.name)),
            attempted: false,
        };
    };

    let result = match tool {
        CalendarTool::CreateEvents => match parse_args::<CreateEventsArgs>(call) {
            Ok(args) => {
                apply_each(&args.events, |event| async move {
                    provider.create_event(None, event).await.map(|_| ())
                })
                .await
            }
            Err(e) => return invalid_args(e),
        },
        CalendarTool::UpdateEvents => match parse_args::<UpdateEventsArgs>(call) {
            Ok(args) => {
                apply_each(&args.updates, |update| async move {
                    provider
                        .update_event(None, &update.event_id, &update.patch)
                        .await
                        .map(|_| ())
                })
                .await
            }
            Err(e) => return invalid_args(e),
        },
        CalendarTool::DeleteEvents => match parse_args::<DeleteEventsArgs>(call) {
            Ok(args) => {
                apply_each(&args.event_ids, |event_id| async move {
                    provider.delete_event(None, event_id).await
                })
                .await
            }
            Err(e) => return invalid_args(e),
        },
    };

    info!(
        "Tool {} finished: success={} count={:?}",
        tool.name(),
        result.success,
        result.count
    );
    ExecutedCall {
        result,
        attempted: true,
    }
}

fn invalid_args(error: String) -> ExecutedCall {
    warn!("{}", error);
    ExecutedCall {
        result: ToolResult::failed(error),
        attempted: false,
    }
}
