use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat/completions` on the Z.ai web app.
///
/// The web client sends several free-form maps; each one is modelled as a
/// struct carrying only the flags the adapter sets, with the defaults the
/// browser would send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRequest {
    /// Always `true`: buffering for non-streaming callers happens downstream.
    pub stream: bool,
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub params: UpstreamParams,
    pub features: UpstreamFeatures,
    pub background_tasks: BackgroundTasks,
    pub chat_id: String,
    /// Message id of the active turn.
    pub id: String,
    pub mcp_servers: Vec<String>,
    pub model_item: UpstreamModelItem,
    pub tool_servers: Vec<String>,
    pub variables: UpstreamVariables,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: String,
}

/// Sampling parameters. The web client sends an empty object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamFeatures {
    /// Defaults to `true`; reasoning arrives in the `thinking` phase.
    pub enable_thinking: bool,
}

impl Default for UpstreamFeatures {
    fn default() -> Self {
        Self {
            enable_thinking: true,
        }
    }
}

/// Side jobs the web app would otherwise run on the conversation. Both off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundTasks {
    pub title_generation: bool,
    pub tags_generation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamModelItem {
    pub id: String,
    pub name: String,
    pub owned_by: String,
}

/// Template substitutions the upstream applies to its system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamVariables {
    #[serde(rename = "{{USER_NAME}}")]
    pub user_name: String,
    #[serde(rename = "{{USER_LOCATION}}")]
    pub user_location: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "{{CURRENT_DATETIME}}")]
    pub current_datetime: String,
}

impl UpstreamVariables {
    pub fn new(current_datetime: impl Into<String>) -> Self {
        Self {
            user_name: "User".to_string(),
            user_location: "Unknown".to_string(),
            current_datetime: current_datetime.into(),
        }
    }
}
