//! Synchronous protocol transforms between the OpenAI chat surface and the
//! upstream web chat protocol.
//!
//! Nothing here performs IO: the async layer in `zproxy-core` feeds bytes in
//! and writes the produced frames out.

pub mod assemble;
pub mod frames;
pub mod thinking;
pub mod translate;

pub use assemble::{ChunkAssembler, CollectOutcome, CompletionCollector};
pub use frames::{FrameDecoder, UpstreamFault, UpstreamFrame};
pub use thinking::transform_delta;
pub use translate::{TranslateOptions, translate};

#[cfg(test)]
mod tests;
