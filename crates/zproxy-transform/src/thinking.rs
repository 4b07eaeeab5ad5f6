use std::sync::LazyLock;

use regex::Regex;
use zproxy_common::ThinkTagsMode;
use zproxy_protocol::upstream::Phase;

static SUMMARY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>.*?</summary>").expect("summary regex"));
static DETAILS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<details[^>]*>").expect("details regex"));

const DETAILS_CLOSE: &str = "</details>";
const RESIDUAL_TOKENS: [&str; 3] = ["</thinking>", "<Full>", "</Full>"];

/// Rewrites the text of one upstream delta for downstream consumption.
///
/// Only `thinking` deltas are touched; everything else is returned as is.
pub fn transform_delta(text: &str, phase: &Phase, mode: ThinkTagsMode) -> String {
    match phase {
        Phase::Thinking => transform_thinking(text, mode),
        _ => text.to_string(),
    }
}

/// The order matters: the summary span must go before the residual tokens
/// are stripped, and the block-quote markers are only exposed once the
/// container has been handled and the text trimmed.
pub fn transform_thinking(text: &str, mode: ThinkTagsMode) -> String {
    let mut out = SUMMARY_SPAN.replace_all(text, "").into_owned();
    for token in RESIDUAL_TOKENS {
        out = out.replace(token, "");
    }
    let mut out = out.trim().to_string();

    match mode {
        ThinkTagsMode::Strip => {
            out = DETAILS_OPEN.replace_all(&out, "").into_owned();
            out = out.replace(DETAILS_CLOSE, "");
        }
        ThinkTagsMode::Think => {
            out = DETAILS_OPEN.replace_all(&out, "<think>").into_owned();
            out = out.replace(DETAILS_CLOSE, "</think>");
        }
        ThinkTagsMode::Raw => {}
    }

    let out = out.strip_prefix("> ").unwrap_or(&out);
    out.replace("\n> ", "\n").trim().to_string()
}
