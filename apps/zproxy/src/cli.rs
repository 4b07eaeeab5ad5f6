use clap::Parser;

use zproxy_common::{
    DEFAULT_API_KEY, DEFAULT_FE_VERSION, DEFAULT_MODEL_NAME, DEFAULT_ORIGIN, DEFAULT_PORT,
    DEFAULT_TIMEOUT_SECS, DEFAULT_UPSTREAM_MODEL, DEFAULT_UPSTREAM_URL, ProxyConfig,
    ThinkTagsMode,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "zproxy",
    version,
    about = "OpenAI-compatible adapter for the Z.ai web chat"
)]
pub(crate) struct Cli {
    /// Bind host.
    #[arg(long, env = "ZPROXY_HOST", default_value = "0.0.0.0")]
    pub(crate) host: String,

    /// Bind port.
    #[arg(long, env = "ZPROXY_PORT", default_value_t = DEFAULT_PORT)]
    pub(crate) port: u16,

    /// Key downstream clients must send as a bearer token.
    #[arg(long, env = "ZPROXY_API_KEY", default_value = DEFAULT_API_KEY)]
    pub(crate) api_key: String,

    #[arg(long, env = "ZPROXY_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub(crate) upstream_url: String,

    /// Web app origin; also used to fetch anonymous tokens.
    #[arg(long, env = "ZPROXY_ORIGIN", default_value = DEFAULT_ORIGIN)]
    pub(crate) origin: String,

    /// Fallback upstream token.
    #[arg(long, env = "ZPROXY_UPSTREAM_TOKEN", default_value = "")]
    pub(crate) upstream_token: String,

    #[arg(long, env = "ZPROXY_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub(crate) model_name: String,

    #[arg(long, env = "ZPROXY_UPSTREAM_MODEL", default_value = DEFAULT_UPSTREAM_MODEL)]
    pub(crate) upstream_model: String,

    #[arg(long, env = "ZPROXY_FE_VERSION", default_value = DEFAULT_FE_VERSION)]
    pub(crate) fe_version: String,

    /// strip | think | raw
    #[arg(long, env = "ZPROXY_THINK_TAGS", default_value = "strip")]
    pub(crate) think_tags: ThinkTagsMode,

    /// Fetch a guest token per conversation.
    #[arg(
        long,
        env = "ZPROXY_ANON_TOKEN",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub(crate) anon_token: bool,

    #[arg(long, env = "ZPROXY_DEBUG")]
    pub(crate) debug: bool,

    /// Upstream read timeout in seconds.
    #[arg(long, env = "ZPROXY_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub(crate) timeout_secs: u64,

    /// Optional outbound proxy for upstream requests.
    #[arg(long, env = "ZPROXY_PROXY")]
    pub(crate) proxy: Option<String>,
}

impl Cli {
    pub(crate) fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            host: self.host,
            port: self.port,
            api_key: self.api_key,
            upstream_url: self.upstream_url,
            origin: self.origin,
            upstream_token: self.upstream_token,
            model_name: self.model_name,
            upstream_model: self.upstream_model,
            fe_version: self.fe_version,
            think_tags: self.think_tags,
            anon_token: self.anon_token,
            debug: self.debug,
            timeout_secs: self.timeout_secs,
            proxy: self
                .proxy
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }
}
