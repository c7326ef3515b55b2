//! Client SDK for the Strata geospatial compute and catalog platform.
//!
//! This crate wraps the platform's gRPC surface behind a retrying,
//! credential-aware client:
//!
//! - **ServiceClient**: lazy channel + operation registry, merged call
//!   metadata, error translation
//! - **Retry**: bounded retry with exponential backoff that honors
//!   server-specified `retry-after` delays
//! - **Auth**: per-call bearer tokens through a [`auth::TokenProvider`]
//! - **Proxy**: authenticating forward-proxy support via channel options
//!
//! # Calling an operation
//!
//! ```ignore
//! use strata_client::{CallOptions, OperationDescriptor, ServiceClient};
//!
//! let client = ServiceClient::builder("platform.strata.dev")
//!     .token_provider(strata_client::auth::EnvTokenProvider::new())
//!     .operation(OperationDescriptor::new(
//!         "GetScene",
//!         "/strata.catalog.v1.Catalog/GetScene",
//!     ))
//!     .build();
//!
//! let scene: GetSceneResponse = client
//!     .call("GetScene", request, CallOptions::new())
//!     .await?;
//! ```
//!
//! Request and response types are any prost messages matching the
//! platform's published protos.
//!
//! # Retry control
//!
//! Every call runs under the client's default retry policy. Override it,
//! or opt out, per call:
//!
//! ```ignore
//! use strata_client::{CallOptions, RetryPolicy};
//!
//! // Tighter budget for this call only
//! let options = CallOptions::new().retry(RetryPolicy::new(2));
//!
//! // No retry: behaves exactly like a direct call
//! let options = CallOptions::new().no_retry();
//! ```
//!
//! # Health check
//!
//! ```ignore
//! use strata_client::ServingStatus;
//!
//! match client.health_check().await? {
//!     ServingStatus::Serving => {}
//!     status => eprintln!("platform degraded: {status:?}"),
//! }
//! ```
//!
//! # Proxied deployments
//!
//! ```ignore
//! use strata_client::proxy::ProxyAuthentication;
//!
//! let mut proxy = ProxyAuthentication::new();
//! proxy.register_proxy("grpc", "http://proxy.internal:8888")?;
//!
//! let client = ServiceClient::builder("platform.strata.dev")
//!     .proxy(proxy)
//!     .build();
//! ```

pub mod auth;
pub mod grpc;
pub mod health;
pub mod proxy;
pub mod retry;
pub mod tls;

mod client;
mod error;

pub use client::{
    CallOptions, HEALTH_CHECK_OPERATION, ON_BEHALF_OF_HEADER, OperationDescriptor, RetryOverride,
    ServiceClient, ServiceClientBuilder,
};
pub use error::{ClientError, Result};
pub use grpc::{GrpcChannel, GrpcStatus, GrpcStatusCode, Metadata, ServiceEndpoint};
pub use health::ServingStatus;
pub use retry::{Retry, RetryPolicy};
