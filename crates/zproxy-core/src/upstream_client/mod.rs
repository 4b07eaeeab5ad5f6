use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, info, warn};
use wreq::{Client, Proxy, RequestBuilder};

use zproxy_common::ProxyConfig;
use zproxy_protocol::upstream::UpstreamRequest;

use crate::credential::token_prefix;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36 Edg/139.0.0.0";
pub const SEC_CH_UA: &str =
    "\"Not;A=Brand\";v=\"99\", \"Microsoft Edge\";v=\"139\", \"Chromium\";v=\"139\"";
pub const ACCEPT_LANGUAGE: &str = "zh-CN";
/// Sent by the web app's guest-token request.
pub const AUTHS_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw upstream body. Items are chunks as read from the socket; an `Err`
/// carries the transport error message and ends the body.
pub type ByteStream = BoxStream<'static, Result<Bytes, String>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("upstream unreachable: {0}")]
    Network(String),
    #[error("upstream returned status {0}")]
    BadStatus(u16),
    #[error("failed to encode upstream request: {0}")]
    Encode(String),
}

pub trait UpstreamClient: Send + Sync {
    /// Sends one chat request and returns the streaming body on a 2xx reply.
    fn call<'a>(
        &'a self,
        request: &'a UpstreamRequest,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, UpstreamFailure>> + Send + 'a>>;
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub url: String,
    pub origin: String,
    pub fe_version: String,
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
    /// Applies to each read, so long streams are not cut off.
    pub read_timeout: Duration,
    /// Logs request bodies and error bodies.
    pub debug: bool,
}

impl UpstreamClientConfig {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            url: config.upstream_url.clone(),
            origin: config.origin_base().to_string(),
            fe_version: config.fe_version.clone(),
            proxy: config.proxy.clone(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: config.upstream_timeout(),
            debug: config.debug,
        }
    }
}

#[derive(Clone)]
pub struct WreqUpstreamClient {
    config: UpstreamClientConfig,
    client: Client,
}

impl WreqUpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, wreq::Error> {
        let client = build_client(
            config.connect_timeout,
            config.read_timeout,
            config.proxy.as_deref(),
        )?;
        Ok(Self { config, client })
    }
}

pub(crate) fn normalize_proxy(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|item| !item.is_empty())
}

pub(crate) fn build_client(
    connect_timeout: Duration,
    read_timeout: Duration,
    proxy: Option<&str>,
) -> Result<Client, wreq::Error> {
    let mut builder = Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout);

    if let Some(proxy) = normalize_proxy(proxy) {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Headers a desktop Edge session on the web app would send.
pub(crate) fn with_browser_headers(
    builder: RequestBuilder,
    origin: &str,
    fe_version: &str,
    accept_language: &str,
) -> RequestBuilder {
    builder
        .header("User-Agent", USER_AGENT)
        .header("Accept-Language", accept_language)
        .header("sec-ch-ua", SEC_CH_UA)
        .header("sec-ch-ua-mobile", "?0")
        .header("sec-ch-ua-platform", "\"Windows\"")
        .header("X-FE-Version", fe_version)
        .header("Origin", origin)
}

impl UpstreamClient for WreqUpstreamClient {
    fn call<'a>(
        &'a self,
        request: &'a UpstreamRequest,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, UpstreamFailure>> + Send + 'a>> {
        Box::pin(async move {
            let body = serde_json::to_vec(request)
                .map_err(|err| UpstreamFailure::Encode(err.to_string()))?;

            info!(
                event = "upstream_request",
                url = %self.config.url,
                chat_id = %request.chat_id,
                model = %request.model,
                messages = request.messages.len(),
                token_prefix = %token_prefix(token)
            );
            if self.config.debug {
                debug!(
                    event = "upstream_request",
                    chat_id = %request.chat_id,
                    body = %String::from_utf8_lossy(&body)
                );
            }

            let referer = format!("{}/c/{}", self.config.origin, request.chat_id);
            let builder = self
                .client
                .post(&self.config.url)
                .header("Content-Type", "application/json")
                .header("Accept", "application/json, text/event-stream")
                .header("Referer", referer)
                .header("Authorization", format!("Bearer {token}"));
            let builder = with_browser_headers(
                builder,
                &self.config.origin,
                &self.config.fe_version,
                ACCEPT_LANGUAGE,
            );

            let resp = builder
                .body(body)
                .send()
                .await
                .map_err(|err| UpstreamFailure::Network(err.to_string()))?;

            let status = resp.status().as_u16();
            info!(event = "upstream_response", chat_id = %request.chat_id, status);
            if !(200..300).contains(&status) {
                if self.config.debug {
                    let text = resp.text().await.unwrap_or_default();
                    warn!(
                        event = "upstream_response",
                        chat_id = %request.chat_id,
                        status,
                        body = %text
                    );
                }
                return Err(UpstreamFailure::BadStatus(status));
            }

            Ok(resp
                .bytes_stream()
                .map(|item| item.map_err(|err| err.to_string()))
                .boxed())
        })
    }
}
