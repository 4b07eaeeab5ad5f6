use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use wreq::Client;

use zproxy_common::ProxyConfig;

use crate::upstream_client::{AUTHS_ACCEPT_LANGUAGE, build_client, with_browser_headers};

const ANON_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const ANON_TOKEN_PATH: &str = "/api/v1/auths/";
const TOKEN_PREFIX_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no upstream credential available")]
    Unavailable,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Token to present upstream for one conversation.
    async fn acquire(&self) -> Result<String, CredentialError>;
}

/// The configured fallback token.
#[derive(Debug, Clone)]
pub struct FixedToken {
    token: String,
}

impl FixedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for FixedToken {
    async fn acquire(&self) -> Result<String, CredentialError> {
        if self.token.trim().is_empty() {
            return Err(CredentialError::Unavailable);
        }
        Ok(self.token.clone())
    }
}

/// Fetches a fresh guest token per call, falling back to the fixed token.
#[derive(Clone)]
pub struct AnonymousToken {
    client: Client,
    url: String,
    origin: String,
    fe_version: String,
    fallback: FixedToken,
}

#[derive(Debug, thiserror::Error)]
enum AnonTokenFailure {
    #[error("request failed: {0}")]
    Network(String),
    #[error("status {0}")]
    BadStatus(u16),
    #[error("undecodable body: {0}")]
    Decode(String),
    #[error("empty token")]
    EmptyToken,
}

#[derive(Debug, Deserialize)]
struct AuthsResponse {
    #[serde(default)]
    token: String,
}

impl AnonymousToken {
    pub fn new(config: &ProxyConfig) -> Result<Self, wreq::Error> {
        let client = build_client(ANON_TOKEN_TIMEOUT, ANON_TOKEN_TIMEOUT, config.proxy.as_deref())?;
        Ok(Self {
            client,
            url: format!("{}{}", config.origin_base(), ANON_TOKEN_PATH),
            origin: config.origin_base().to_string(),
            fe_version: config.fe_version.clone(),
            fallback: FixedToken::new(config.upstream_token.clone()),
        })
    }

    async fn fetch(&self) -> Result<String, AnonTokenFailure> {
        let builder = self
            .client
            .get(&self.url)
            .header("Accept", "*/*")
            .header("Referer", format!("{}/", self.origin))
            .timeout(ANON_TOKEN_TIMEOUT);
        let resp = with_browser_headers(
            builder,
            &self.origin,
            &self.fe_version,
            AUTHS_ACCEPT_LANGUAGE,
        )
        .send()
        .await
        .map_err(|err| AnonTokenFailure::Network(err.to_string()))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(AnonTokenFailure::BadStatus(status));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|err| AnonTokenFailure::Network(err.to_string()))?;
        let parsed: AuthsResponse = serde_json::from_slice(&body)
            .map_err(|err| AnonTokenFailure::Decode(err.to_string()))?;
        let token = parsed.token.trim();
        if token.is_empty() {
            return Err(AnonTokenFailure::EmptyToken);
        }
        Ok(token.to_string())
    }
}

#[async_trait]
impl CredentialProvider for AnonymousToken {
    async fn acquire(&self) -> Result<String, CredentialError> {
        match self.fetch().await {
            Ok(token) => {
                info!(
                    event = "anon_token",
                    token_prefix = %token_prefix(&token),
                    "anonymous token acquired"
                );
                Ok(token)
            }
            Err(err) => {
                warn!(
                    event = "anon_token",
                    error = %err,
                    "anonymous token fetch failed, using fallback token"
                );
                self.fallback.acquire().await
            }
        }
    }
}

/// Picks the strategy selected by `anon_token`.
pub fn credential_provider(
    config: &ProxyConfig,
) -> Result<Arc<dyn CredentialProvider>, wreq::Error> {
    if config.anon_token {
        return Ok(Arc::new(AnonymousToken::new(config)?));
    }
    Ok(Arc::new(FixedToken::new(config.upstream_token.clone())))
}

/// First few characters of a token, for logs.
pub fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(TOKEN_PREFIX_CHARS) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_token_requires_a_value() {
        assert_eq!(FixedToken::new("abc").acquire().await, Ok("abc".to_string()));
        assert_eq!(
            FixedToken::new("  ").acquire().await,
            Err(CredentialError::Unavailable)
        );
    }

    #[test]
    fn token_prefix_is_char_safe() {
        assert_eq!(token_prefix("eyJhbGciOiJIUzI1NiJ9.payload"), "eyJhbGciOi");
        assert_eq!(token_prefix("short"), "short");
        assert_eq!(token_prefix("ééééééééééééé"), "éééééééééé");
    }
}
