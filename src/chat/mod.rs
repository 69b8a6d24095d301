pub mod client;
pub mod dispatch;
pub mod prompt;
pub mod tools;
pub mod types;

pub use client::{ChatModel, OpenRouterClient};
pub use dispatch::{run_chat_turn, ChatOutcome, FALLBACK_REPLY};
pub use prompt::build_system_prompt;
pub use tools::{tool_definitions, ToolResult};
pub use types::{ChatMessage, FunctionCall, ToolCall};
