use bytes::Bytes;
use serde_json::{Value as JsonValue, json};
use time::macros::datetime;
use zproxy_common::ThinkTagsMode;
use zproxy_protocol::openai::create_chat_completions::request::CreateChatCompletionRequestBody;
use zproxy_protocol::openai::create_chat_completions::types::ChatCompletionRequestMessage;
use zproxy_protocol::upstream::{Phase, UpstreamEvent};

use super::*;
use crate::assemble::{completion_response, render_delta};
use crate::thinking::transform_thinking;
use crate::translate::prior_context;

fn event(phase: &str, content: &str) -> UpstreamFrame {
    UpstreamFrame::Event(UpstreamEvent {
        kind: "chat:completion".to_string(),
        phase: Phase::parse(Some(phase)),
        delta_content: content.to_string(),
        done: false,
        error: None,
    })
}

fn done_event() -> UpstreamFrame {
    UpstreamFrame::Event(UpstreamEvent {
        kind: "chat:completion".to_string(),
        phase: Phase::Done,
        delta_content: String::new(),
        done: true,
        error: None,
    })
}

fn data_line(value: JsonValue) -> String {
    format!("data: {value}\n\n")
}

/// Decodes one emitted SSE frame; `[DONE]` comes back as a JSON string.
fn payload(frame: &Bytes) -> JsonValue {
    let text = std::str::from_utf8(frame).unwrap();
    let body = text
        .strip_prefix("data: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .unwrap();
    if body == "[DONE]" {
        return JsonValue::String(body.to_string());
    }
    serde_json::from_str(body).unwrap()
}

fn chat_request(messages: Vec<ChatCompletionRequestMessage>) -> CreateChatCompletionRequestBody {
    CreateChatCompletionRequestBody {
        model: "GLM-4.5".to_string(),
        messages,
        stream: false,
        temperature: None,
        max_tokens: None,
    }
}

fn options() -> TranslateOptions {
    TranslateOptions {
        upstream_model: "0727-360B-API".to_string(),
        model_name: "GLM-4.5".to_string(),
        enable_thinking: true,
    }
}

// ---- thinking ----

#[test]
fn strip_removes_summary_details_and_quote_markers() {
    let input = "<details type=\"reasoning\" done=\"true\">\n<summary>Thought for\n2 seconds</summary>\n> first line\n> second line\n</details>";
    let out = transform_thinking(input, ThinkTagsMode::Strip);
    assert_eq!(out, "first line\nsecond line");
    assert!(!out.contains("summary"));
    assert!(!out.contains("details"));
    assert!(!out.starts_with("> "));
    assert!(!out.contains("\n> "));
}

#[test]
fn think_mode_renames_details_container() {
    let input = "<details type=\"reasoning\">\n> pondering\n</details>";
    let out = transform_thinking(input, ThinkTagsMode::Think);
    assert_eq!(out, "<think>\npondering\n</think>");
}

#[test]
fn raw_mode_keeps_details_container() {
    let input = "<details open>\n> pondering</details>";
    let out = transform_thinking(input, ThinkTagsMode::Raw);
    assert_eq!(out, "<details open>\npondering</details>");
}

#[test]
fn residual_tokens_are_removed() {
    let out = transform_thinking("<Full>  > keep</Full></thinking>", ThinkTagsMode::Strip);
    assert_eq!(out, "keep");
}

#[test]
fn only_thinking_phase_is_transformed() {
    let text = "> quoted <details>answer</details>";
    assert_eq!(
        transform_delta(text, &Phase::Answer, ThinkTagsMode::Strip),
        text
    );
    assert_eq!(
        transform_delta(text, &Phase::Other("tool_call".to_string()), ThinkTagsMode::Strip),
        text
    );
    assert_eq!(
        transform_delta(text, &Phase::Thinking, ThinkTagsMode::Strip),
        "quoted answer"
    );
}

#[test]
fn empty_transform_result_is_not_rendered() {
    let UpstreamFrame::Event(summary_only) = event("thinking", "<summary>Thinking…</summary>")
    else {
        unreachable!()
    };
    assert_eq!(render_delta(&summary_only, ThinkTagsMode::Strip), None);

    let UpstreamFrame::Event(answer_space) = event("answer", " ") else {
        unreachable!()
    };
    assert_eq!(
        render_delta(&answer_space, ThinkTagsMode::Strip),
        Some(" ".to_string())
    );
}

// ---- translate ----

#[test]
fn earlier_messages_become_context_and_last_is_active_turn() {
    let request = chat_request(vec![
        ChatCompletionRequestMessage::new("system", "be brief"),
        ChatCompletionRequestMessage::new("user", "hi"),
        ChatCompletionRequestMessage::new("assistant", "hello"),
        ChatCompletionRequestMessage::new("user", "what is rust?"),
    ]);
    let upstream = translate(&request, &options(), datetime!(2025-08-01 09:05:03 UTC));

    assert!(upstream.stream);
    assert_eq!(upstream.model, "0727-360B-API");
    assert_eq!(upstream.messages.len(), 2);
    assert_eq!(upstream.messages[0].role, "system");
    assert_eq!(
        upstream.messages[0].content,
        "system: be brief\nuser: hi\nassistant: hello"
    );
    assert_eq!(upstream.messages[1].role, "user");
    assert_eq!(upstream.messages[1].content, "what is rust?");
    assert_eq!(upstream.variables.current_datetime, "2025-08-01 09:05:03");
    assert_eq!(upstream.model_item.name, "GLM-4.5");
    assert!(upstream.features.enable_thinking);
}

#[test]
fn single_message_has_no_context() {
    let request = chat_request(vec![ChatCompletionRequestMessage::new("user", "ping")]);
    let upstream = translate(&request, &options(), datetime!(2025-01-01 00:00:00 UTC));
    assert_eq!(upstream.messages.len(), 1);
    assert_eq!(upstream.messages[0].content, "ping");
    assert_eq!(prior_context(&[]), "");
}

#[test]
fn upstream_is_always_asked_to_stream() {
    let mut request = chat_request(vec![ChatCompletionRequestMessage::new("user", "ping")]);
    request.stream = true;
    let streaming = translate(&request, &options(), datetime!(2025-01-01 00:00:00 UTC));
    request.stream = false;
    let buffered = translate(&request, &options(), datetime!(2025-01-01 00:00:00 UTC));
    assert!(streaming.stream);
    assert!(buffered.stream);
}

#[test]
fn translation_is_identical_except_for_identifiers() {
    let request = chat_request(vec![
        ChatCompletionRequestMessage::new("user", "hi"),
        ChatCompletionRequestMessage::new("user", "again"),
    ]);
    let now = datetime!(2025-03-04 05:06:07 UTC);
    let mut first = translate(&request, &options(), now);
    let mut second = translate(&request, &options(), now);

    assert_ne!(first.chat_id, second.chat_id);
    assert_ne!(first.id, second.id);
    assert_ne!(first.chat_id, first.id);

    first.chat_id.clear();
    first.id.clear();
    second.chat_id.clear();
    second.id.clear();
    assert_eq!(first, second);
}

#[test]
fn upstream_body_matches_vendor_schema() {
    let request = chat_request(vec![ChatCompletionRequestMessage::new("user", "hi")]);
    let upstream = translate(&request, &options(), datetime!(2025-01-01 00:00:00 UTC));
    let value = serde_json::to_value(&upstream).unwrap();
    assert_eq!(value["stream"], json!(true));
    assert_eq!(value["params"], json!({}));
    assert_eq!(value["features"], json!({"enable_thinking": true}));
    assert_eq!(
        value["background_tasks"],
        json!({"title_generation": false, "tags_generation": false})
    );
    assert_eq!(value["variables"]["{{USER_NAME}}"], json!("User"));
    assert_eq!(value["mcp_servers"], json!([]));
    assert_eq!(value["model_item"]["owned_by"], json!("openai"));
}

// ---- frames ----

#[test]
fn malformed_line_between_valid_frames_is_skipped() {
    let mut decoder = FrameDecoder::new();
    let answer = |content: &str| {
        data_line(json!({
            "type": "chat:completion",
            "data": {"phase": "answer", "delta_content": content}
        }))
    };
    let body = format!("{}data: {{not json\n\n{}", answer("one"), answer("two"));
    let mut frames = decoder.push(body.as_bytes());
    frames.extend(decoder.finish());

    let contents: Vec<_> = frames
        .iter()
        .map(|frame| match frame {
            UpstreamFrame::Event(event) => event.delta_content.as_str(),
            UpstreamFrame::Fault(_) => panic!("unexpected fault"),
        })
        .collect();
    assert_eq!(contents, vec!["one", "two"]);
}

#[test]
fn consecutive_data_lines_without_blank_separator_are_decoded() {
    let mut decoder = FrameDecoder::new();
    let body = "data: {\"data\":{\"phase\":\"answer\",\"delta_content\":\"a\"}}\ndata: garbage\ndata: {\"data\":{\"phase\":\"answer\",\"delta_content\":\"b\"}}\n\n";
    let frames = decoder.push(body.as_bytes());
    assert_eq!(frames.len(), 2);
}

#[test]
fn each_data_line_is_decoded_as_soon_as_it_ends() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"data: {\"data\":{\"phase\":\"answer\",\"delta_content\":\"a\"}}\n");
    assert_eq!(frames.len(), 1);
    assert!(matches!(&frames[0], UpstreamFrame::Event(event) if event.delta_content == "a"));

    let frames = decoder.push(b"data: {\"data\":{\"phase\":\"done\",\"done\":true}}\n");
    assert_eq!(frames.len(), 1);
    assert!(matches!(&frames[0], UpstreamFrame::Event(event) if event.is_completion()));

    let frames = decoder.push(b"data: {\"error\":{\"code\":429,\"detail\":\"slow down\"}}\n");
    assert_eq!(frames.len(), 1);
    assert!(matches!(&frames[0], UpstreamFrame::Fault(UpstreamFault::Reported(_))));
    assert!(decoder.is_halted());
}

#[test]
fn reported_error_halts_the_decoder() {
    let mut decoder = FrameDecoder::new();
    let body = format!(
        "{}{}{}",
        data_line(json!({"data":{"phase":"answer","delta_content":"before"}})),
        data_line(json!({"data":{"data":{"error":{"code":500,"detail":"boom"}}}})),
        data_line(json!({"data":{"phase":"answer","delta_content":"after"}})),
    );
    let frames = decoder.push(body.as_bytes());
    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], UpstreamFrame::Event(event) if event.delta_content == "before"));
    match &frames[1] {
        UpstreamFrame::Fault(UpstreamFault::Reported(err)) => assert_eq!(err.detail, "boom"),
        other => panic!("expected fault, got {other:?}"),
    }
    assert!(decoder.is_halted());
    let more = data_line(json!({"data":{"phase":"answer","delta_content":"late"}}));
    assert!(decoder.push(more.as_bytes()).is_empty());
    assert!(decoder.finish().is_empty());
}

#[test]
fn done_sentinel_and_non_data_records_are_ignored() {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.push(b"event: ping\n\n: comment\n\ndata: [DONE]\n\ndata: \n\n");
    assert!(frames.is_empty());
}

// ---- streaming assembler ----

#[test]
fn streaming_sequence_for_thinking_then_answer() {
    let mut assembler =
        ChunkAssembler::with_id("chatcmpl-1", "GLM-4.5", 1_700_000_000, ThinkTagsMode::Strip);
    let upstream = vec![
        event("thinking", "<details type=\"reasoning\">\n> Let me think"),
        event("thinking", "<summary>Thought for 1 second</summary>"),
        event("thinking", "\n> about it</details>"),
        event("answer", "Hello!"),
        done_event(),
        event("answer", "ignored"),
    ];

    let mut out = assembler.start();
    for frame in &upstream {
        out.extend(assembler.push(frame));
    }
    out.extend(assembler.finish());

    let payloads: Vec<_> = out.iter().map(payload).collect();
    assert_eq!(payloads.len(), 6);
    assert_eq!(payloads[0]["choices"][0]["delta"], json!({"role": "assistant"}));
    assert_eq!(payloads[1]["choices"][0]["delta"], json!({"content": "Let me think"}));
    assert_eq!(payloads[2]["choices"][0]["delta"], json!({"content": "about it"}));
    assert_eq!(payloads[3]["choices"][0]["delta"], json!({"content": "Hello!"}));
    assert_eq!(payloads[4]["choices"][0]["delta"], json!({}));
    assert_eq!(payloads[4]["choices"][0]["finish_reason"], json!("stop"));
    assert_eq!(payloads[5], json!("[DONE]"));

    for chunk in &payloads[..5] {
        assert_eq!(chunk["id"], json!("chatcmpl-1"));
        assert_eq!(chunk["object"], json!("chat.completion.chunk"));
        assert_eq!(chunk["model"], json!("GLM-4.5"));
        assert_eq!(chunk["created"], json!(1_700_000_000));
    }
    for chunk in &payloads[..4] {
        assert!(chunk["choices"][0].get("finish_reason").is_none());
    }
}

#[test]
fn fault_after_output_ends_with_stop_and_done() {
    let mut assembler = ChunkAssembler::with_id("chatcmpl-2", "GLM-4.5", 1, ThinkTagsMode::Strip);
    let mut out = assembler.start();
    out.extend(assembler.push(&event("answer", "partial")));
    out.extend(assembler.push(&UpstreamFrame::Fault(UpstreamFault::Transport(
        "connection reset".to_string(),
    ))));
    out.extend(assembler.push(&event("answer", "never")));
    out.extend(assembler.finish());

    let payloads: Vec<_> = out.iter().map(payload).collect();
    assert_eq!(payloads.len(), 4);
    assert_eq!(payloads[1]["choices"][0]["delta"]["content"], json!("partial"));
    assert_eq!(payloads[2]["choices"][0]["finish_reason"], json!("stop"));
    assert_eq!(payloads[3], json!("[DONE]"));
    assert!(assembler.is_finished());
}

#[test]
fn eof_without_completion_still_terminates_once() {
    let mut assembler = ChunkAssembler::new("GLM-4.5", ThinkTagsMode::Strip);
    assert!(assembler.id().starts_with("chatcmpl-"));
    let mut out = assembler.push(&event("answer", "hi"));
    out.extend(assembler.finish());
    out.extend(assembler.finish());

    let payloads: Vec<_> = out.iter().map(payload).collect();
    assert_eq!(payloads.len(), 4);
    assert_eq!(
        payloads.iter().filter(|p| **p == json!("[DONE]")).count(),
        1
    );
}

// ---- non-streaming collector ----

#[test]
fn collector_concatenates_rendered_deltas_in_order() {
    let mut collector = CompletionCollector::new(ThinkTagsMode::Strip);
    let upstream = vec![
        event("thinking", "<details type=\"reasoning\">\n> Let me think"),
        event("thinking", "<summary>Thought for 1 second</summary>"),
        event("thinking", "\n> about it</details>"),
        event("answer", "Hello!"),
        done_event(),
    ];
    let mut consumed = 0;
    for frame in &upstream {
        consumed += 1;
        if !collector.push(frame) {
            break;
        }
    }
    assert_eq!(consumed, upstream.len());
    assert!(!collector.push(&event("answer", "late")));
    assert_eq!(
        collector.into_outcome(),
        CollectOutcome::Complete("Let me thinkabout itHello!".to_string())
    );
}

#[test]
fn collector_reports_failure_and_partial_content() {
    let fault = UpstreamFault::Transport("reset".to_string());

    let mut empty = CompletionCollector::new(ThinkTagsMode::Strip);
    assert!(!empty.push(&UpstreamFrame::Fault(fault.clone())));
    assert_eq!(empty.into_outcome(), CollectOutcome::Failed(fault.clone()));

    let mut partial = CompletionCollector::new(ThinkTagsMode::Strip);
    assert!(partial.push(&event("answer", "half")));
    assert!(!partial.push(&UpstreamFrame::Fault(fault.clone())));
    assert_eq!(partial.content(), "half");
    assert_eq!(
        partial.into_outcome(),
        CollectOutcome::Partial {
            content: "half".to_string(),
            fault,
        }
    );
}

#[test]
fn completion_response_shape() {
    let response = completion_response("chatcmpl-3", "GLM-4.5", 42, "answer".to_string());
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "chatcmpl-3",
            "object": "chat.completion",
            "created": 42,
            "model": "GLM-4.5",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "answer"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}
        })
    );
}
