use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{info, warn};

use zproxy_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use zproxy_protocol::openai::list_models::response::{ListModelsResponse, ListObjectType};
use zproxy_protocol::openai::list_models::types::{Model, ModelObjectType};
use zproxy_transform::assemble::{completion_id, completion_response, now_epoch_seconds};
use zproxy_transform::{
    ChunkAssembler, CollectOutcome, CompletionCollector, UpstreamFrame, translate,
};

use crate::core::{CoreState, RequestTraceId};
use crate::error::ProxyError;
use crate::frames::upstream_frames;

pub const PARTIAL_HEADER: HeaderName = HeaderName::from_static("x-zproxy-partial");
const MODEL_OWNER: &str = "z.ai";

pub async fn chat_completions(
    State(state): State<Arc<CoreState>>,
    Extension(RequestTraceId(trace_id)): Extension<RequestTraceId>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request: CreateChatCompletionRequestBody = serde_json::from_slice(&body)
        .map_err(|err| ProxyError::bad_request(format!("invalid request body: {err}")))?;
    if request.messages.is_empty() {
        return Err(ProxyError::bad_request("messages must not be empty"));
    }
    info!(
        event = "chat_request",
        trace_id = %trace_id,
        model = %request.model,
        messages = request.messages.len(),
        stream = request.stream
    );

    let upstream_request = translate(&request, &state.translate, OffsetDateTime::now_utc());
    let token = state.credentials.acquire().await.map_err(|err| {
        warn!(event = "credential_unavailable", trace_id = %trace_id, error = %err);
        ProxyError::bad_gateway(err.to_string())
    })?;
    let body = state
        .upstream
        .call(&upstream_request, &token)
        .await
        .map_err(|err| {
            warn!(
                event = "upstream_fault",
                trace_id = %trace_id,
                chat_id = %upstream_request.chat_id,
                error = %err
            );
            ProxyError::bad_gateway(err.to_string())
        })?;
    let frames = upstream_frames(body);

    if request.stream {
        Ok(stream_response(&state, trace_id, frames))
    } else {
        collect_response(&state, &trace_id, frames).await
    }
}

struct StreamState {
    frames: BoxStream<'static, UpstreamFrame>,
    assembler: ChunkAssembler,
    pending: VecDeque<Bytes>,
    trace_id: String,
}

fn stream_response(
    state: &CoreState,
    trace_id: String,
    frames: BoxStream<'static, UpstreamFrame>,
) -> Response {
    let mut assembler =
        ChunkAssembler::new(state.config.model_name.clone(), state.config.think_tags);
    let pending = assembler.start().into();
    let state = StreamState {
        frames,
        assembler,
        pending,
        trace_id,
    };

    let body = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.pending.pop_front() {
                return Some((Ok::<Bytes, Infallible>(chunk), state));
            }
            if state.assembler.is_finished() {
                info!(
                    event = "stream_finished",
                    trace_id = %state.trace_id,
                    completion_id = %state.assembler.id()
                );
                return None;
            }
            match state.frames.next().await {
                Some(frame) => {
                    if let UpstreamFrame::Fault(fault) = &frame {
                        warn!(
                            event = "upstream_fault",
                            trace_id = %state.trace_id,
                            error = %fault,
                            "ending stream early"
                        );
                    }
                    let chunks = state.assembler.push(&frame);
                    state.pending.extend(chunks);
                }
                None => {
                    let chunks = state.assembler.finish();
                    state.pending.extend(chunks);
                }
            }
        }
    });

    let mut response = Response::new(Body::from_stream(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

async fn collect_response(
    state: &CoreState,
    trace_id: &str,
    mut frames: BoxStream<'static, UpstreamFrame>,
) -> Result<Response, ProxyError> {
    let mut collector = CompletionCollector::new(state.config.think_tags);
    while let Some(frame) = frames.next().await {
        if !collector.push(&frame) {
            break;
        }
    }
    drop(frames);

    let model = state.config.model_name.clone();
    let (content, partial) = match collector.into_outcome() {
        CollectOutcome::Complete(content) => (content, false),
        CollectOutcome::Partial { content, fault } => {
            warn!(
                event = "upstream_fault",
                trace_id = %trace_id,
                error = %fault,
                collected = content.len(),
                "returning partial completion"
            );
            (content, true)
        }
        CollectOutcome::Failed(fault) => {
            warn!(event = "upstream_fault", trace_id = %trace_id, error = %fault);
            return Err(ProxyError::bad_gateway(fault.to_string()));
        }
    };

    let completion = completion_response(completion_id(), model, now_epoch_seconds(), content);
    let mut response = Json(completion).into_response();
    if partial {
        response
            .headers_mut()
            .insert(PARTIAL_HEADER, HeaderValue::from_static("upstream-error"));
    }
    Ok(response)
}

pub async fn list_models(State(state): State<Arc<CoreState>>) -> Json<ListModelsResponse> {
    Json(ListModelsResponse {
        object: ListObjectType::List,
        data: vec![Model {
            id: state.config.model_name.clone(),
            object: ModelObjectType::Model,
            created: now_epoch_seconds(),
            owned_by: MODEL_OWNER.to_string(),
        }],
    })
}

pub async fn options_ok() -> StatusCode {
    StatusCode::OK
}

/// Unknown paths: `OPTIONS` is refused, everything else gets a status
/// payload.
pub async fn fallback(State(state): State<Arc<CoreState>>, method: Method) -> Response {
    if method == Method::OPTIONS {
        return ProxyError::not_found("not found").into_response();
    }
    Json(json!({
        "status": "zproxy service running",
        "model": state.config.model_name,
    }))
    .into_response()
}
