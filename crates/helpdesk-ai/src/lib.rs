//! Language-model completion surface for the helpdesk responder.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, HelpdeskAiError, LlmClient, Message, MessageRole,
};
