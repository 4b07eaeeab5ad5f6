//! Wire types for both sides of the adapter: the OpenAI-compatible surface
//! served downstream and the Z.ai web chat protocol spoken upstream.

pub mod openai;
pub mod sse;
pub mod upstream;
