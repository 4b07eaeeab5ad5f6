use serde::{Deserialize, Serialize};

use crate::openai::create_chat_completions::types::ChatCompletionRequestMessage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChatCompletionRequestBody {
    /// Model ID requested by the caller. Only echoed in logs; responses carry
    /// the configured display name.
    pub model: String,
    /// Conversation so far. Must contain at least 1 message (checked by the handler).
    pub messages: Vec<ChatCompletionRequestMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Accepted for compatibility, not forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Accepted for compatibility, not forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}
