mod common;

use calchat::chat::{run_chat_turn, ChatMessage, ToolCall, ToolResult, FALLBACK_REPLY};
use calchat::chat::tools::{CREATE_CALENDAR_EVENT, DELETE_CALENDAR_EVENTS, UPDATE_CALENDAR_EVENT};
use common::{RecordingProvider, ScriptedModel};
use serde_json::json;

fn requesting(calls: Vec<ToolCall>) -> ChatMessage {
    ChatMessage {
        role: "assistant".to_string(),
        content: None,
        tool_call_id: None,
        tool_calls: Some(calls),
    }
}

fn create_args(summary: &str) -> String {
    json!({
        "events": [{
            "summary": summary,
            "start": { "dateTime": "2025-03-14T15:00:00", "timeZone": "UTC" },
            "end": { "dateTime": "2025-03-14T16:00:00", "timeZone": "UTC" }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_plain_reply_is_returned_verbatim() {
    let model = ScriptedModel::new(vec![ChatMessage::assistant("  You are free all afternoon.  ")]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(
        &model,
        &provider,
        "system prompt",
        &[ChatMessage::user("Am I busy today?")],
    )
    .await
    .unwrap();

    assert_eq!(outcome.message, "  You are free all afternoon.  ");
    assert!(!outcome.tools_executed);
    assert!(outcome.tool_results.is_empty());
    assert!(provider.untouched());

    // One call: system prompt plus history, with all three tools offered
    assert_eq!(model.calls(), vec![(2, 3)]);
}

#[tokio::test]
async fn test_empty_tool_call_list_is_a_plain_reply() {
    let mut reply = requesting(vec![]);
    reply.content = Some("Nothing to change.".to_string());
    let model = ScriptedModel::new(vec![reply]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(
        &model,
        &provider,
        "system prompt",
        &[ChatMessage::user("Move my dentist appointment")],
    )
    .await
    .unwrap();

    assert_eq!(outcome.message, "Nothing to change.");
    assert!(!outcome.tools_executed);
    assert!(outcome.tool_results.is_empty());
    assert!(provider.untouched());
    assert_eq!(model.calls(), vec![(2, 3)]);
}

#[tokio::test]
async fn test_failed_call_does_not_stop_the_next_one() {
    let model = ScriptedModel::new(vec![
        requesting(vec![
            ToolCall::function("call_1", CREATE_CALENDAR_EVENT, create_args("fail")),
            ToolCall::function("call_2", CREATE_CALENDAR_EVENT, create_args("Dentist")),
        ]),
        ChatMessage::assistant("The first event failed, the dentist is booked."),
    ]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Book both")])
        .await
        .unwrap();

    assert!(outcome.tools_executed);
    assert_eq!(outcome.message, "The first event failed, the dentist is booked.");
    assert_eq!(
        outcome.tool_results,
        vec![
            ToolResult {
                success: false,
                count: None,
                error: Some("Tool execution failed: Failed to create event".to_string()),
            },
            ToolResult::ok(1),
        ]
    );
    assert_eq!(*provider.created.lock().unwrap(), vec!["Dentist".to_string()]);

    // Second call sees system, user, assistant and two tool results, with no tools
    assert_eq!(model.calls(), vec![(2, 3), (5, 0)]);

    let sent = model.last_messages.lock().unwrap().clone();
    assert_eq!(sent[2].requested_tool_calls().len(), 2);
    assert_eq!(sent[3].role, "tool");
    assert_eq!(sent[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(sent[4].tool_call_id.as_deref(), Some("call_2"));
    let result: serde_json::Value = serde_json::from_str(sent[4].text()).unwrap();
    assert_eq!(result, json!({ "success": true, "count": 1 }));
}

#[tokio::test]
async fn test_batch_stops_at_first_failure_and_reports_progress() {
    let args = json!({ "eventIds": ["a", "missing", "c"] }).to_string();
    let model = ScriptedModel::new(vec![
        requesting(vec![ToolCall::function("call_1", DELETE_CALENDAR_EVENTS, args)]),
        ChatMessage::assistant("Deleted one of them."),
    ]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Clear it")])
        .await
        .unwrap();

    assert!(outcome.tools_executed);
    assert_eq!(outcome.tool_results[0].success, false);
    assert_eq!(outcome.tool_results[0].count, Some(1));
    assert_eq!(*provider.deleted.lock().unwrap(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_update_applies_only_given_fields() {
    let args = json!({
        "updates": [{ "eventId": "evt-7", "summary": "Renamed" }]
    })
    .to_string();
    let model = ScriptedModel::new(vec![
        requesting(vec![ToolCall::function("call_1", UPDATE_CALENDAR_EVENT, args)]),
        ChatMessage::assistant("Renamed it."),
    ]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Rename")])
        .await
        .unwrap();
    assert_eq!(outcome.tool_results, vec![ToolResult::ok(1)]);

    let updated = provider.updated.lock().unwrap();
    assert_eq!(updated[0].0, "evt-7");
    assert_eq!(updated[0].1.summary.as_deref(), Some("Renamed"));
    assert!(updated[0].1.start.is_none());
}

#[tokio::test]
async fn test_unknown_tool_and_bad_arguments_never_reach_the_provider() {
    let model = ScriptedModel::new(vec![
        requesting(vec![
            ToolCall::function("call_1", "send_email", "{}"),
            ToolCall::function("call_2", CREATE_CALENDAR_EVENT, "{not json"),
        ]),
        ChatMessage::assistant(""),
    ]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Email Bob")])
        .await
        .unwrap();

    assert!(!outcome.tools_executed);
    assert_eq!(
        outcome.tool_results[0],
        ToolResult::failed("Unknown tool: send_email")
    );
    assert!(!outcome.tool_results[1].success);
    assert!(provider.created.lock().unwrap().is_empty());

    // Empty reconciliation text falls back
    assert_eq!(outcome.message, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_tool_calls_in_the_second_reply_are_ignored() {
    let model = ScriptedModel::new(vec![
        requesting(vec![ToolCall::function("call_1", CREATE_CALENDAR_EVENT, create_args("Gym"))]),
        ChatMessage {
            content: Some("Booked the gym.".to_string()),
            ..requesting(vec![ToolCall::function("call_2", CREATE_CALENDAR_EVENT, create_args("Again"))])
        },
    ]);
    let provider = RecordingProvider::new();

    let outcome = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Gym at 3")])
        .await
        .unwrap();

    assert_eq!(outcome.message, "Booked the gym.");
    assert_eq!(*provider.created.lock().unwrap(), vec!["Gym".to_string()]);
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let model = ScriptedModel::new(Vec::new());
    let provider = RecordingProvider::new();

    let result = run_chat_turn(&model, &provider, "prompt", &[ChatMessage::user("Hi")]).await;
    assert!(result.is_err());
}
