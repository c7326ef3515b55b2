//! gRPC transport layer: endpoints, channels, metadata, and status.
//!
//! The heavy lifting (HTTP/2, flow control, TLS) is tonic's; this module
//! adapts it to the platform's conventions:
//!
//! - [`ServiceEndpoint`] / [`ChannelFactory`]: named host + port with
//!   secure/insecure modes, lazy connection, proxy channel options.
//! - [`Metadata`]: ordered headers with deterministic last-write-wins
//!   merging across client, operation, and call sources.
//! - [`GrpcStatus`]: the domain view of a failed call, including the
//!   retry classification of its status code and any `retry-after`
//!   trailer.

mod channel;
mod metadata;
mod status;

pub use channel::{
    ChannelFactory, DEFAULT_INSECURE_PORT, DEFAULT_SECURE_PORT, GrpcChannel, ServiceEndpoint,
    USER_AGENT,
};
pub use metadata::Metadata;
pub use status::{GrpcStatus, GrpcStatusCode};

// Re-export tonic types for advanced usage
pub use tonic;
