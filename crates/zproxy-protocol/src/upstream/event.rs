use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Raw payload of one upstream `data:` line.
///
/// Every field is optional on the wire; the upstream omits or nulls them
/// freely depending on the event type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamData {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<UpstreamDataBody>,
    #[serde(default)]
    pub error: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamDataBody {
    #[serde(default)]
    pub delta_content: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub usage: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<JsonValue>,
    #[serde(default)]
    pub data: Option<UpstreamInnerBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamInnerBody {
    #[serde(default)]
    pub error: Option<JsonValue>,
}

/// Error object reported by the upstream inside the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamError {
    #[serde(default)]
    pub code: Option<JsonValue>,
    #[serde(default)]
    pub detail: String,
}

impl UpstreamError {
    /// Interprets an `error` value found in a frame. `null` means "no error";
    /// a bare string is taken as the detail.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::String(detail) => Some(Self {
                code: None,
                detail: detail.clone(),
            }),
            JsonValue::Object(map) => {
                let detail = map
                    .get("detail")
                    .or_else(|| map.get("message"))
                    .map(|value| match value {
                        JsonValue::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                Some(Self {
                    code: map.get("code").filter(|code| !code.is_null()).cloned(),
                    detail,
                })
            }
            other => Some(Self {
                code: None,
                detail: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(JsonValue::String(code)) => write!(f, "code={code}, detail={}", self.detail),
            Some(code) => write!(f, "code={code}, detail={}", self.detail),
            None => write!(f, "detail={}", self.detail),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    Thinking,
    Answer,
    Done,
    #[default]
    Unknown,
    Other(String),
}

impl Phase {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("") => Self::Unknown,
            Some("thinking") => Self::Thinking,
            Some("answer") => Self::Answer,
            Some("done") => Self::Done,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// One decoded upstream frame, flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamEvent {
    pub kind: String,
    pub phase: Phase,
    pub delta_content: String,
    pub done: bool,
    /// First error found at `error`, `data.error` or `data.data.error`.
    pub error: Option<UpstreamError>,
}

impl UpstreamEvent {
    /// `done` flag set or phase `done`.
    pub fn is_completion(&self) -> bool {
        self.done || self.phase == Phase::Done
    }
}

impl From<UpstreamData> for UpstreamEvent {
    fn from(value: UpstreamData) -> Self {
        let body = value.data.unwrap_or_default();
        let error = value
            .error
            .as_ref()
            .and_then(UpstreamError::from_value)
            .or_else(|| body.error.as_ref().and_then(UpstreamError::from_value))
            .or_else(|| {
                body.data
                    .as_ref()
                    .and_then(|inner| inner.error.as_ref())
                    .and_then(UpstreamError::from_value)
            });
        Self {
            kind: value.kind.unwrap_or_default(),
            phase: Phase::parse(body.phase.as_deref()),
            delta_content: body.delta_content.unwrap_or_default(),
            done: body.done.unwrap_or(false),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> UpstreamEvent {
        serde_json::from_str::<UpstreamData>(raw)
            .map(UpstreamEvent::from)
            .unwrap()
    }

    #[test]
    fn delta_frame_flattens() {
        let event = decode(
            r#"{"type":"chat:completion","data":{"delta_content":"hi","phase":"answer","done":false}}"#,
        );
        assert_eq!(event.kind, "chat:completion");
        assert_eq!(event.phase, Phase::Answer);
        assert_eq!(event.delta_content, "hi");
        assert!(!event.is_completion());
        assert!(event.error.is_none());
    }

    #[test]
    fn completion_by_flag_or_phase() {
        assert!(decode(r#"{"data":{"done":true}}"#).is_completion());
        assert!(decode(r#"{"data":{"phase":"done"}}"#).is_completion());
        assert!(!decode(r#"{"data":{"phase":"other"}}"#).is_completion());
    }

    #[test]
    fn error_found_at_every_nesting_level() {
        let top = decode(r#"{"error":{"code":401,"detail":"top"}}"#);
        assert_eq!(top.error.unwrap().detail, "top");

        let nested = decode(r#"{"data":{"error":{"code":500,"detail":"nested"}}}"#);
        assert_eq!(nested.error.unwrap().detail, "nested");

        let inner = decode(r#"{"data":{"data":{"error":{"code":"E1","detail":"inner"}}}}"#);
        let inner = inner.error.unwrap();
        assert_eq!(inner.detail, "inner");
        assert_eq!(inner.to_string(), "code=E1, detail=inner");
    }

    #[test]
    fn null_fields_are_tolerated() {
        let event =
            decode(r#"{"type":null,"data":{"delta_content":null,"phase":null,"error":null}}"#);
        assert_eq!(event.phase, Phase::Unknown);
        assert_eq!(event.delta_content, "");
        assert!(event.error.is_none());
    }
}
