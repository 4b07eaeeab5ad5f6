pub mod event;
pub mod request;

pub use event::{Phase, UpstreamData, UpstreamError, UpstreamEvent};
pub use request::{
    BackgroundTasks, UpstreamFeatures, UpstreamMessage, UpstreamModelItem, UpstreamParams,
    UpstreamRequest, UpstreamVariables,
};
