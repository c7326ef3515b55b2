//! Error types for the client SDK.

use thiserror::Error;

use crate::grpc::GrpcStatus;

/// Errors that can occur while configuring or calling the platform.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The endpoint host/port could not be turned into a valid URI.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A metadata key or value is not a valid ASCII header.
    #[error("invalid metadata header: {0}")]
    InvalidHeader(String),

    /// A registered operation carries a malformed gRPC method path.
    #[error("invalid gRPC method path: {0}")]
    InvalidPath(String),

    /// TLS trust-store resolution or certificate parsing failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Proxy registration or proxy-authorizer failure.
    ///
    /// Raised at channel-build time, before any network activity.
    #[error("proxy configuration error: {0}")]
    Proxy(String),

    /// The token provider could not supply a bearer token.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A remote call failed with a gRPC status.
    ///
    /// This is the domain translation of any transport-level failure.
    #[error("RPC failed: {0}")]
    Rpc(GrpcStatus),

    /// The operation name is not present in the client's registry.
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    /// A retried call failed on every attempt.
    ///
    /// `attempts` holds every attempt's error in order; the most recent
    /// one is chained as the direct cause.
    #[error("call failed after {} attempts: {source}", .attempts.len())]
    RetriesExhausted {
        /// Each attempt's error, oldest first.
        attempts: Vec<ClientError>,
        /// The final attempt's error.
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// The gRPC status carried by this error, if it is an RPC failure.
    pub fn status(&self) -> Option<&GrpcStatus> {
        match self {
            Self::Rpc(status) => Some(status),
            Self::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc(GrpcStatus::from(status))
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
