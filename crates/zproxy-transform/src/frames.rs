use std::fmt;

use tracing::debug;
use zproxy_protocol::sse::{SseEvent, SseParser};
use zproxy_protocol::upstream::{UpstreamData, UpstreamError, UpstreamEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFrame {
    Event(UpstreamEvent),
    /// Terminal: nothing follows a fault.
    Fault(UpstreamFault),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFault {
    /// Error object embedded in the event stream.
    Reported(UpstreamError),
    /// The body could not be read to the end.
    Transport(String),
}

impl fmt::Display for UpstreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamFault::Reported(err) => write!(f, "upstream reported error: {err}"),
            UpstreamFault::Transport(msg) => write!(f, "upstream read failed: {msg}"),
        }
    }
}

/// Turns upstream body bytes into [`UpstreamFrame`]s, one per `data:` line,
/// as soon as the line is complete.
///
/// Undecodable payloads are skipped. The first reported error halts the
/// decoder: it is returned as a fault and all later input is ignored.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    parser: SseParser,
    halted: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<UpstreamFrame> {
        if self.halted {
            return Vec::new();
        }
        let events = self.parser.push_bytes(chunk);
        self.decode_events(events)
    }

    pub fn finish(&mut self) -> Vec<UpstreamFrame> {
        if self.halted {
            return Vec::new();
        }
        let events = self.parser.finish();
        self.decode_events(events)
    }

    fn decode_events(&mut self, events: Vec<SseEvent>) -> Vec<UpstreamFrame> {
        let mut frames = Vec::new();
        for event in events {
            let Some(upstream) = decode_payload(&event.data) else {
                continue;
            };
            if let Some(err) = upstream.error {
                self.halted = true;
                frames.push(UpstreamFrame::Fault(UpstreamFault::Reported(err)));
                return frames;
            }
            frames.push(UpstreamFrame::Event(upstream));
        }
        frames
    }
}

fn decode_payload(data: &str) -> Option<UpstreamEvent> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<UpstreamData>(data) {
        Ok(parsed) => Some(parsed.into()),
        Err(err) => {
            debug!(event = "frame_skipped", error = %err, payload = %data);
            None
        }
    }
}
