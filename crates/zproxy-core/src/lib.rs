pub mod auth;
pub mod core;
pub mod credential;
pub mod error;
pub mod frames;
pub mod handler;
pub mod upstream_client;

pub use core::{Core, CoreState, REQUEST_ID_HEADER, RequestTraceId};
pub use credential::{
    AnonymousToken, CredentialError, CredentialProvider, FixedToken, credential_provider,
};
pub use error::ProxyError;
pub use upstream_client::{
    ByteStream, UpstreamClient, UpstreamClientConfig, UpstreamFailure, WreqUpstreamClient,
};
