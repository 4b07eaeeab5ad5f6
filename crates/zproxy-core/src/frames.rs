use std::collections::VecDeque;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use zproxy_transform::{FrameDecoder, UpstreamFault, UpstreamFrame};

use crate::upstream_client::ByteStream;

struct FrameState {
    body: Option<ByteStream>,
    decoder: FrameDecoder,
    pending: VecDeque<UpstreamFrame>,
}

/// Lazily decodes an upstream body into frames.
///
/// The body is dropped as soon as a fault is produced or the decoder halts;
/// the stream ends after the fault.
pub fn upstream_frames(body: ByteStream) -> BoxStream<'static, UpstreamFrame> {
    let state = FrameState {
        body: Some(body),
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                if matches!(frame, UpstreamFrame::Fault(_)) {
                    state.body = None;
                    state.pending.clear();
                }
                return Some((frame, state));
            }

            let body = state.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(&chunk);
                    state.pending.extend(frames);
                }
                Some(Err(message)) => {
                    state.body = None;
                    state
                        .pending
                        .push_back(UpstreamFrame::Fault(UpstreamFault::Transport(message)));
                }
                None => {
                    state.body = None;
                    let frames = state.decoder.finish();
                    state.pending.extend(frames);
                }
            }
        }
    })
    .boxed()
}
