use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;
use zproxy_common::ThinkTagsMode;
use zproxy_protocol::openai::create_chat_completions::response::{
    ChatCompletionChoice, ChatCompletionObjectType, CreateChatCompletionResponse,
};
use zproxy_protocol::openai::create_chat_completions::stream::{
    ChatCompletionChunkObjectType, ChatCompletionStreamChoice, CreateChatCompletionStreamResponse,
};
use zproxy_protocol::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionResponseMessage, ChatCompletionRole,
    ChatCompletionStreamResponseDelta, CompletionUsage,
};
use zproxy_protocol::upstream::UpstreamEvent;

use crate::frames::{UpstreamFault, UpstreamFrame};
use crate::thinking::transform_delta;

pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

pub fn sse_json_bytes<T: Serialize>(value: &T) -> Option<Bytes> {
    let payload = serde_json::to_vec(value).ok()?;
    let mut data = Vec::with_capacity(payload.len() + 8);
    data.extend_from_slice(b"data: ");
    data.extend_from_slice(&payload);
    data.extend_from_slice(b"\n\n");
    Some(Bytes::from(data))
}

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or_default()
}

pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

/// Downstream text for one upstream event, or `None` when nothing should be
/// forwarded.
pub fn render_delta(event: &UpstreamEvent, mode: ThinkTagsMode) -> Option<String> {
    if event.delta_content.is_empty() {
        return None;
    }
    let out = transform_delta(&event.delta_content, &event.phase, mode);
    if out.is_empty() { None } else { Some(out) }
}

/// Streaming assembler: upstream frames in, `chat.completion.chunk` SSE
/// frames out.
///
/// Emits the role chunk first, content chunks as they arrive, and exactly
/// one stop chunk followed by `[DONE]`. Frames pushed after that are ignored.
#[derive(Debug)]
pub struct ChunkAssembler {
    id: String,
    model: String,
    created: i64,
    mode: ThinkTagsMode,
    started: bool,
    finished: bool,
}

impl ChunkAssembler {
    pub fn new(model: impl Into<String>, mode: ThinkTagsMode) -> Self {
        Self::with_id(completion_id(), model, now_epoch_seconds(), mode)
    }

    pub fn with_id(
        id: impl Into<String>,
        model: impl Into<String>,
        created: i64,
        mode: ThinkTagsMode,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created,
            mode,
            started: false,
            finished: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Role announcement. Only the first call produces output.
    pub fn start(&mut self) -> Vec<Bytes> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        let delta = ChatCompletionStreamResponseDelta {
            role: Some(ChatCompletionRole::Assistant),
            content: None,
        };
        self.chunk(delta, None).into_iter().collect()
    }

    pub fn push(&mut self, frame: &UpstreamFrame) -> Vec<Bytes> {
        if self.finished {
            return Vec::new();
        }
        let mut out = self.start();
        match frame {
            UpstreamFrame::Fault(_) => out.extend(self.finish()),
            UpstreamFrame::Event(event) => {
                if let Some(content) = render_delta(event, self.mode) {
                    let delta = ChatCompletionStreamResponseDelta {
                        role: None,
                        content: Some(content),
                    };
                    out.extend(self.chunk(delta, None));
                }
                if event.is_completion() {
                    out.extend(self.finish());
                }
            }
        }
        out
    }

    /// Stop chunk and `[DONE]`. Only the first call produces output.
    pub fn finish(&mut self) -> Vec<Bytes> {
        if self.finished {
            return Vec::new();
        }
        let mut out = self.start();
        self.finished = true;
        out.extend(self.chunk(
            ChatCompletionStreamResponseDelta::default(),
            Some(ChatCompletionFinishReason::Stop),
        ));
        out.push(Bytes::from_static(DONE_FRAME));
        out
    }

    fn chunk(
        &self,
        delta: ChatCompletionStreamResponseDelta,
        finish_reason: Option<ChatCompletionFinishReason>,
    ) -> Option<Bytes> {
        let chunk = CreateChatCompletionStreamResponse {
            id: self.id.clone(),
            object: ChatCompletionChunkObjectType::ChatCompletionChunk,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatCompletionStreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        };
        sse_json_bytes(&chunk)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectOutcome {
    /// Completion signal seen, or clean EOF.
    Complete(String),
    /// Fault after some content was collected.
    Partial {
        content: String,
        fault: UpstreamFault,
    },
    /// Fault before any content.
    Failed(UpstreamFault),
}

/// Non-streaming assembler: buffers rendered deltas until the upstream
/// signals completion, faults, or ends.
#[derive(Debug)]
pub struct CompletionCollector {
    mode: ThinkTagsMode,
    content: String,
    fault: Option<UpstreamFault>,
    finished: bool,
}

impl CompletionCollector {
    pub fn new(mode: ThinkTagsMode) -> Self {
        Self {
            mode,
            content: String::new(),
            fault: None,
            finished: false,
        }
    }

    /// Returns `false` once no more frames are wanted.
    pub fn push(&mut self, frame: &UpstreamFrame) -> bool {
        if self.finished {
            return false;
        }
        match frame {
            UpstreamFrame::Fault(fault) => {
                self.fault = Some(fault.clone());
                self.finished = true;
            }
            UpstreamFrame::Event(event) => {
                if let Some(content) = render_delta(event, self.mode) {
                    self.content.push_str(&content);
                }
                self.finished = event.is_completion();
            }
        }
        !self.finished
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_outcome(self) -> CollectOutcome {
        match self.fault {
            None => CollectOutcome::Complete(self.content),
            Some(fault) if self.content.is_empty() => CollectOutcome::Failed(fault),
            Some(fault) => CollectOutcome::Partial {
                content: self.content,
                fault,
            },
        }
    }
}

pub fn completion_response(
    id: impl Into<String>,
    model: impl Into<String>,
    created: i64,
    content: String,
) -> CreateChatCompletionResponse {
    CreateChatCompletionResponse {
        id: id.into(),
        object: ChatCompletionObjectType::ChatCompletion,
        created,
        model: model.into(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ChatCompletionResponseMessage {
                role: ChatCompletionRole::Assistant,
                content,
            },
            finish_reason: ChatCompletionFinishReason::Stop,
        }],
        usage: CompletionUsage::default(),
    }
}
