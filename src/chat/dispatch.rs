use super::client::ChatModel;
use super::tools::{execute_tool_call, tool_definitions, ToolResult};
use super::types::ChatMessage;
use crate::calendar::CalendarProvider;
use crate::error::AppResult;
use tracing::{debug, info, warn};

/// Reply used when the reconciliation turn comes back without text
pub const FALLBACK_REPLY: &str = "I've processed your request.";

/// Result of one chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Text shown to the user
    pub message: String,
    /// Whether any tool call reached the provider; the caller re-fetches if so
    pub tools_executed: bool,
    /// Per tool call results in the order the model requested them
    pub tool_results: Vec<ToolResult>,
}

/// Run one bounded chat turn.
///
/// The first model call may request tool calls. They run one after another
/// against `provider`, each failure contained in its own result, and a second
/// model call without tools turns the results into the final reply. There is
/// never a third call.
pub async fn run_chat_turn(
    model: &dyn ChatModel,
    provider: &dyn CalendarProvider,
    system_prompt: &str,
    history: &[ChatMessage],
) -> AppResult<ChatOutcome> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend_from_slice(history);

    let first = model.complete(&messages, &tool_definitions()).await?;
    let calls = first.requested_tool_calls().to_vec();

    if calls.is_empty() {
        debug!("Model answered without tool calls");
        return Ok(ChatOutcome {
            message: first.text().to_string(),
            tools_executed: false,
            tool_results: Vec::new(),
        });
    }

    info!("Model requested {} tool call(s)", calls.len());
    messages.push(first);

    let mut tools_executed = false;
    let mut tool_results = Vec::with_capacity(calls.len());
    for call in &calls {
        let executed = execute_tool_call(provider, call).await;
        tools_executed |= executed.attempted;
        messages.push(ChatMessage::tool_result(&call.id, executed.result.to_content()));
        tool_results.push(executed.result);
    }

    let second = model.complete(&messages, &[]).await?;
    if !second.requested_tool_calls().is_empty() {
        warn!(
            "Ignoring {} tool call(s) requested in the reconciliation turn",
            second.requested_tool_calls().len()
        );
    }

    let text = second.text().trim();
    let message = if text.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        text.to_string()
    };

    Ok(ChatOutcome {
        message,
        tools_executed,
        tool_results,
    })
}
