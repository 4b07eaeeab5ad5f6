use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("invalid url for {field}: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("unknown think tags mode: {0} (expected strip, think or raw)")]
    UnknownThinkTagsMode(String),
}

/// How the `<details>` container around upstream reasoning is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkTagsMode {
    /// Drop the container markers.
    #[default]
    Strip,
    /// Rename the container to `<think>…</think>`.
    Think,
    /// Forward the markup untouched.
    Raw,
}

impl FromStr for ThinkTagsMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strip" => Ok(Self::Strip),
            "think" => Ok(Self::Think),
            "raw" => Ok(Self::Raw),
            other => Err(ConfigError::UnknownThinkTagsMode(other.to_string())),
        }
    }
}

impl fmt::Display for ThinkTagsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strip => "strip",
            Self::Think => "think",
            Self::Raw => "raw",
        };
        f.write_str(name)
    }
}

pub const DEFAULT_UPSTREAM_URL: &str = "https://chat.z.ai/api/chat/completions";
pub const DEFAULT_ORIGIN: &str = "https://chat.z.ai";
pub const DEFAULT_API_KEY: &str = "123123";
pub const DEFAULT_MODEL_NAME: &str = "GLM-4.5";
pub const DEFAULT_UPSTREAM_MODEL: &str = "0727-360B-API";
pub const DEFAULT_FE_VERSION: &str = "prod-fe-1.0.70";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Final configuration used by the running process.
///
/// Built once at start-up and shared read-only (behind `Arc`) by every
/// component that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Key downstream clients must present as `Authorization: Bearer <key>`.
    pub api_key: String,
    /// Chat endpoint of the upstream web app.
    pub upstream_url: String,
    /// Origin the browser fingerprint claims to come from (also the base of
    /// the anonymous token endpoint).
    pub origin: String,
    /// Fallback bearer token for the upstream. May be empty when anonymous
    /// tokens are enabled.
    pub upstream_token: String,
    /// Model id shown to downstream clients.
    pub model_name: String,
    /// Model id the upstream expects.
    pub upstream_model: String,
    pub fe_version: String,
    pub think_tags: ThinkTagsMode,
    pub anon_token: bool,
    pub debug: bool,
    pub timeout_secs: u64,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            api_key: DEFAULT_API_KEY.to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            upstream_token: String::new(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            upstream_model: DEFAULT_UPSTREAM_MODEL.to_string(),
            fe_version: DEFAULT_FE_VERSION.to_string(),
            think_tags: ThinkTagsMode::Strip,
            anon_token: true,
            debug: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("api_key"));
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::MissingField("model_name"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        ensure_http_url("upstream_url", &self.upstream_url)?;
        ensure_http_url("origin", &self.origin)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Origin without a trailing slash.
    pub fn origin_base(&self) -> &str {
        self.origin.trim_end_matches('/')
    }
}

fn ensure_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}
