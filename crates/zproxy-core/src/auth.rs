use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::core::{CoreState, RequestTraceId};
use crate::error::ProxyError;

pub const MISSING_AUTH_MESSAGE: &str = "missing or invalid authorization header";
pub const INVALID_KEY_MESSAGE: &str = "invalid api key";

/// Rejects requests whose bearer token does not match the configured key.
/// `OPTIONS` passes through unchecked.
pub async fn require_api_key(
    State(state): State<Arc<CoreState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ProxyError> {
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let trace_id = req
        .extensions()
        .get::<RequestTraceId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let Some(key) = extract_bearer(req.headers()) else {
        warn!(event = "auth_rejected", trace_id = %trace_id, reason = "missing");
        return Err(ProxyError::unauthorized(MISSING_AUTH_MESSAGE));
    };
    if key != state.config.api_key {
        warn!(event = "auth_rejected", trace_id = %trace_id, reason = "mismatch");
        return Err(ProxyError::unauthorized(INVALID_KEY_MESSAGE));
    }

    Ok(next.run(req).await)
}

/// Token from `Authorization: Bearer <token>`; the scheme is matched
/// case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc")), Some("abc".to_string()));
        assert_eq!(extract_bearer(&headers("bearer  abc ")), Some("abc".to_string()));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_rejected() {
        assert_eq!(extract_bearer(&headers("Basic abc")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
        assert_eq!(extract_bearer(&headers("abc")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }
}
