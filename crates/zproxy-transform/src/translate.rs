use time::OffsetDateTime;
use uuid::Uuid;
use zproxy_common::ProxyConfig;
use zproxy_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use zproxy_protocol::openai::create_chat_completions::types::ChatCompletionRequestMessage;
use zproxy_protocol::upstream::{
    BackgroundTasks, UpstreamFeatures, UpstreamMessage, UpstreamModelItem, UpstreamParams,
    UpstreamRequest, UpstreamVariables,
};

const CONTEXT_ROLE: &str = "system";
const MODEL_ITEM_OWNER: &str = "openai";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Model id sent upstream.
    pub upstream_model: String,
    /// Display name advertised in `model_item`.
    pub model_name: String,
    pub enable_thinking: bool,
}

impl TranslateOptions {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            upstream_model: config.upstream_model.clone(),
            model_name: config.model_name.clone(),
            enable_thinking: true,
        }
    }
}

/// Builds the upstream body for one inbound chat request.
///
/// Earlier turns are flattened into a single context message; the final
/// inbound message is sent as the active turn. `chat_id` and `id` are fresh
/// for every call, everything else depends only on the inputs.
pub fn translate(
    request: &CreateChatCompletionRequestBody,
    options: &TranslateOptions,
    now: OffsetDateTime,
) -> UpstreamRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some((last, earlier)) = request.messages.split_last() {
        let context = prior_context(earlier);
        if !context.is_empty() {
            messages.push(UpstreamMessage {
                role: CONTEXT_ROLE.to_string(),
                content: context,
            });
        }
        messages.push(UpstreamMessage {
            role: last.role.clone(),
            content: last.text(),
        });
    }

    UpstreamRequest {
        stream: true,
        model: options.upstream_model.clone(),
        messages,
        params: UpstreamParams::default(),
        features: UpstreamFeatures {
            enable_thinking: options.enable_thinking,
        },
        background_tasks: BackgroundTasks::default(),
        chat_id: Uuid::new_v4().to_string(),
        id: Uuid::new_v4().to_string(),
        mcp_servers: Vec::new(),
        model_item: UpstreamModelItem {
            id: options.upstream_model.clone(),
            name: options.model_name.clone(),
            owned_by: MODEL_ITEM_OWNER.to_string(),
        },
        tool_servers: Vec::new(),
        variables: UpstreamVariables::new(format_datetime(now)),
    }
}

/// `role: content` per message, newline-joined.
pub fn prior_context(messages: &[ChatCompletionRequestMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_datetime(now: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
