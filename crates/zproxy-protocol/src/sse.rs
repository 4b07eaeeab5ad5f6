use bytes::{Buf, BytesMut};

/// One `data:` line, tagged with the `event:` name in effect when it arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental line-oriented SSE parser.
///
/// Works on raw bytes so multi-byte characters split across network chunks
/// are reassembled before decoding. Lines end with `\n` or `\r\n`. Every
/// `data:` line is emitted as soon as its line terminator arrives; a blank
/// line only resets the current `event:` name.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);
            let line = String::from_utf8_lossy(&raw);
            self.push_line(line.strip_suffix('\r').unwrap_or(&line), &mut events);
        }

        events
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.push_bytes(chunk.as_bytes())
    }

    /// Flushes a trailing unterminated line. Call once the byte stream
    /// reached EOF.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = self.buffer.split();
            let line = String::from_utf8_lossy(&raw);
            self.push_line(line.strip_suffix('\r').unwrap_or(&line), &mut events);
        }
        self.event = None;
        events
    }

    fn push_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.event = None;
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("event:") {
            let value = field_value(value);
            self.event = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
            return;
        }
        if line == "event" {
            self.event = None;
            return;
        }

        let data = match line.strip_prefix("data:") {
            Some(value) => field_value(value),
            None if line == "data" => "",
            None => return,
        };
        events.push(SseEvent {
            event: self.event.clone(),
            data: data.to_string(),
        });
    }
}

// A single leading space after the colon belongs to the framing, not the value.
fn field_value(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}
