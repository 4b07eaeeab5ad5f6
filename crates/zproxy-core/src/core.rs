use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::info;

use zproxy_common::ProxyConfig;
use zproxy_transform::TranslateOptions;

use crate::auth::require_api_key;
use crate::credential::CredentialProvider;
use crate::handler::{chat_completions, fallback, list_models, options_ok};
use crate::upstream_client::UpstreamClient;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-zproxy-request-id");

/// Per-request id (UUID v7), shared between logs and the response header.
#[derive(Debug, Clone)]
pub struct RequestTraceId(pub String);

pub struct CoreState {
    pub config: Arc<ProxyConfig>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub translate: TranslateOptions,
}

pub struct Core {
    state: Arc<CoreState>,
}

impl Core {
    pub fn new(
        config: Arc<ProxyConfig>,
        credentials: Arc<dyn CredentialProvider>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let translate = TranslateOptions::from_config(&config);
        Self {
            state: Arc::new(CoreState {
                config,
                credentials,
                upstream,
                translate,
            }),
        }
    }

    pub fn router(&self) -> Router {
        let chat = post(chat_completions)
            .options(options_ok)
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/v1/chat/completions", chat)
            .route("/v1/models", get(list_models).options(options_ok))
            .fallback(fallback)
            .layer(middleware::from_fn(trace_request))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }
}

async fn trace_request(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = uuid::Uuid::now_v7().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    info!(event = "downstream_received", trace_id = %trace_id, method = %method, path = %path);

    req.extensions_mut().insert(RequestTraceId(trace_id.clone()));
    let mut response = next.run(req).await;

    info!(
        event = "downstream_responded",
        trace_id = %trace_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64
    );
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
