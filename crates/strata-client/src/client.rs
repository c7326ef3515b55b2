//! The retryable service client.
//!
//! [`ServiceClient`] composes the channel factory, credential provider,
//! and retry executor into a single facade: operations are registered by
//! name, and every call goes out with merged metadata, per-call bearer
//! credentials, and the configured retry policy.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::uri::PathAndQuery;
use parking_lot::Mutex;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::service::interceptor::InterceptedService;
use tracing::debug;

use crate::auth::{AuthInterceptor, TokenProvider};
use crate::error::{ClientError, Result};
use crate::grpc::{
    ChannelFactory, GrpcChannel, GrpcStatus, Metadata, ServiceEndpoint, USER_AGENT,
};
use crate::health::{HealthCheckRequest, HealthCheckResponse, ServingStatus};
use crate::proxy::ProxyAuthentication;
use crate::retry::{self, RetryPolicy};

/// Metadata key carrying the `on_behalf_of` user.
pub const ON_BEHALF_OF_HEADER: &str = "x-on-behalf-of-user";

/// Name under which the health-check operation is always registered.
pub const HEALTH_CHECK_OPERATION: &str = "Check";

const HEALTH_CHECK_PATH: &str = "/grpc.health.v1.Health/Check";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Declares a remote operation: its registry name, full gRPC method path,
/// and per-operation defaults.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    name: String,
    path: String,
    default_metadata: Metadata,
    timeout: Option<Duration>,
}

impl OperationDescriptor {
    /// Declare an operation with its full method path,
    /// e.g. `/strata.catalog.v1.Catalog/GetScene`.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            default_metadata: Metadata::new(),
            timeout: None,
        }
    }

    /// Default metadata sent with every call to this operation.
    pub fn default_metadata(mut self, metadata: Metadata) -> Self {
        self.default_metadata = metadata;
        self
    }

    /// Default timeout for this operation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The registry name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A registered operation with its validated method path.
#[derive(Debug, Clone)]
pub(crate) struct Operation {
    path: PathAndQuery,
    default_metadata: Metadata,
    timeout: Option<Duration>,
}

/// The operation registry, built once on first API access.
#[derive(Debug)]
pub(crate) struct OperationRegistry {
    operations: HashMap<String, Operation>,
}

impl OperationRegistry {
    fn build(descriptors: &[OperationDescriptor]) -> Result<Self> {
        let health = OperationDescriptor::new(HEALTH_CHECK_OPERATION, HEALTH_CHECK_PATH)
            .timeout(HEALTH_CHECK_TIMEOUT);

        let mut operations = HashMap::new();
        for descriptor in std::iter::once(&health).chain(descriptors) {
            let path = PathAndQuery::from_maybe_shared(descriptor.path.clone())
                .map_err(|e| ClientError::InvalidPath(format!("{}: {e}", descriptor.path)))?;
            operations.insert(
                descriptor.name.clone(),
                Operation {
                    path,
                    default_metadata: descriptor.default_metadata.clone(),
                    timeout: descriptor.timeout,
                },
            );
        }
        Ok(Self { operations })
    }

    fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Per-call retry selection.
#[derive(Debug, Clone, Default)]
pub enum RetryOverride {
    /// Use the client's default policy.
    #[default]
    ClientDefault,
    /// No retry at all; behave exactly like a direct call.
    Disabled,
    /// Use this policy for this call only.
    Policy(RetryPolicy),
}

/// Per-call options: metadata overrides, timeout, retry selection, and
/// the `on_behalf_of` convenience header.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    metadata: Metadata,
    timeout: Option<Duration>,
    retry: RetryOverride,
    on_behalf_of: Option<String>,
}

impl CallOptions {
    /// Default options: client retry policy, no extra metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata overriding client and operation defaults.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Timeout forwarded to the transport as the call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry policy for this call only.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryOverride::Policy(policy);
        self
    }

    /// Disable retry for this call.
    pub fn no_retry(mut self) -> Self {
        self.retry = RetryOverride::Disabled;
        self
    }

    /// Issue the call on behalf of another user, injected as the
    /// `x-on-behalf-of-user` header.
    pub fn on_behalf_of(mut self, user: impl Into<String>) -> Self {
        self.on_behalf_of = Some(user.into());
        self
    }
}

/// Client lifecycle; lazy transitions guarded by one lock.
#[derive(Debug)]
enum ClientState {
    Uninitialized,
    Open(GrpcChannel),
    Ready {
        channel: GrpcChannel,
        registry: Arc<OperationRegistry>,
    },
}

impl ClientState {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Open(_) => "open",
            Self::Ready { .. } => "ready",
        }
    }
}

struct ClientConfig {
    endpoint: ServiceEndpoint,
    default_metadata: Metadata,
    default_retry: Option<RetryPolicy>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    proxy: ProxyAuthentication,
    connect_timeout: Option<Duration>,
    operations: Vec<OperationDescriptor>,
}

/// Builder for [`ServiceClient`].
pub struct ServiceClientBuilder {
    host: String,
    port: Option<u16>,
    insecure: bool,
    default_metadata: Metadata,
    default_retry: Option<RetryPolicy>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    proxy: ProxyAuthentication,
    connect_timeout: Option<Duration>,
    operations: Vec<OperationDescriptor>,
}

impl ServiceClientBuilder {
    /// Start a builder for the given host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            insecure: false,
            default_metadata: Metadata::new(),
            default_retry: Some(RetryPolicy::default()),
            token_provider: None,
            proxy: ProxyAuthentication::new(),
            connect_timeout: None,
            operations: Vec::new(),
        }
    }

    /// Override the port (defaults: 443 secure, 8000 insecure).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Use a plaintext channel. Local and test endpoints only.
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    /// Metadata attached to every call from this client.
    pub fn default_metadata(mut self, metadata: Metadata) -> Self {
        self.default_metadata = metadata;
        self
    }

    /// Replace the default retry policy.
    pub fn default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = Some(policy);
        self
    }

    /// Disable retry by default; calls may still opt in per call.
    pub fn no_default_retry(mut self) -> Self {
        self.default_retry = None;
        self
    }

    /// Supply bearer tokens through a provider.
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Use the given proxy registry for channel construction.
    pub fn proxy(mut self, proxy: ProxyAuthentication) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Register a remote operation.
    pub fn operation(mut self, descriptor: OperationDescriptor) -> Self {
        self.operations.push(descriptor);
        self
    }

    /// Register several remote operations.
    pub fn operations(mut self, descriptors: impl IntoIterator<Item = OperationDescriptor>) -> Self {
        self.operations.extend(descriptors);
        self
    }

    /// Build the client. No network activity happens here.
    pub fn build(self) -> ServiceClient {
        let endpoint = if self.insecure {
            ServiceEndpoint::insecure(self.host)
        } else {
            ServiceEndpoint::secure(self.host)
        };
        let endpoint = match self.port {
            Some(port) => endpoint.with_port(port),
            None => endpoint,
        };

        ServiceClient {
            config: ClientConfig {
                endpoint,
                default_metadata: self.default_metadata,
                default_retry: self.default_retry,
                token_provider: self.token_provider,
                proxy: self.proxy,
                connect_timeout: self.connect_timeout,
                operations: self.operations,
            },
            state: Mutex::new(ClientState::Uninitialized),
        }
    }
}

/// A client for one platform service.
///
/// The channel and operation registry are created lazily on first use and
/// torn down by [`close`](Self::close); a closed client reopens on the
/// next call. All lazy transitions go through a single lock, so concurrent
/// first use from multiple tasks is safe.
///
/// # Example
///
/// ```ignore
/// use strata_client::{CallOptions, OperationDescriptor, ServiceClient};
///
/// let client = ServiceClient::builder("platform.strata.dev")
///     .token_provider(strata_client::auth::EnvTokenProvider::new())
///     .operation(OperationDescriptor::new(
///         "GetScene",
///         "/strata.catalog.v1.Catalog/GetScene",
///     ))
///     .build();
///
/// let scene: GetSceneResponse = client
///     .call("GetScene", GetSceneRequest { id: "s2:L2A:...".into() }, CallOptions::new())
///     .await?;
/// ```
pub struct ServiceClient {
    config: ClientConfig,
    state: Mutex<ClientState>,
}

impl ServiceClient {
    /// Start building a client for the given host.
    pub fn builder(host: impl Into<String>) -> ServiceClientBuilder {
        ServiceClientBuilder::new(host)
    }

    /// The endpoint this client targets.
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.config.endpoint
    }

    fn channel_factory(&self) -> ChannelFactory {
        let mut factory =
            ChannelFactory::new(self.config.endpoint.clone()).proxy(self.config.proxy.clone());
        if let Some(timeout) = self.config.connect_timeout {
            factory = factory.connect_timeout(timeout);
        }
        factory
    }

    /// The transport channel, opened on first access.
    pub fn channel(&self) -> Result<GrpcChannel> {
        let mut state = self.state.lock();
        match &*state {
            ClientState::Open(channel) | ClientState::Ready { channel, .. } => Ok(channel.clone()),
            ClientState::Uninitialized => {
                let channel = self.channel_factory().build()?;
                *state = ClientState::Open(channel.clone());
                Ok(channel)
            }
        }
    }

    /// The channel and operation registry, both built on first access.
    fn api(&self) -> Result<(GrpcChannel, Arc<OperationRegistry>)> {
        let mut state = self.state.lock();
        if let ClientState::Ready { channel, registry } = &*state {
            return Ok((channel.clone(), registry.clone()));
        }

        let channel = match &*state {
            ClientState::Open(channel) => channel.clone(),
            _ => self.channel_factory().build()?,
        };
        let registry = Arc::new(OperationRegistry::build(&self.config.operations)?);
        debug!(
            endpoint = %self.config.endpoint.uri(),
            operations = registry.operations.len(),
            "operation registry built"
        );
        *state = ClientState::Ready {
            channel: channel.clone(),
            registry: registry.clone(),
        };
        Ok((channel, registry))
    }

    /// The names of all registered operations, health check included.
    pub fn operation_names(&self) -> Result<Vec<String>> {
        let (_, registry) = self.api()?;
        Ok(registry.names())
    }

    fn compose_metadata(&self, operation: &Operation, options: &CallOptions) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("user-agent", USER_AGENT);
        metadata.merge(&self.config.default_metadata);
        metadata.merge(&operation.default_metadata);
        metadata.merge(&options.metadata);
        if let Some(user) = &options.on_behalf_of {
            metadata.insert(ON_BEHALF_OF_HEADER, user.as_str());
        }
        metadata
    }

    /// Call a registered operation.
    ///
    /// Merges metadata (client defaults, then operation defaults, then
    /// call overrides, later sources winning per key), attaches bearer
    /// credentials, executes under the resolved retry policy, and
    /// translates any transport failure into [`ClientError`].
    pub async fn call<Req, Resp>(
        &self,
        operation: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Resp>
    where
        Req: prost::Message + Clone + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let (channel, registry) = self.api()?;
        let op = registry
            .get(operation)
            .ok_or_else(|| ClientError::UnknownOperation(operation.to_string()))?;

        let metadata_map = self.compose_metadata(op, &options).to_metadata_map()?;
        let timeout = options.timeout.or(op.timeout);
        let policy = match &options.retry {
            RetryOverride::ClientDefault => self.config.default_retry.clone(),
            RetryOverride::Disabled => None,
            RetryOverride::Policy(policy) => Some(policy.clone()),
        };

        let path = op.path.clone();
        let auth = AuthInterceptor::new(self.config.token_provider.clone());

        retry::execute(policy.as_ref(), || {
            let channel = channel.clone();
            let auth = auth.clone();
            let path = path.clone();
            let metadata_map = metadata_map.clone();
            let request = request.clone();
            async move {
                let mut grpc = Grpc::new(InterceptedService::new(channel.into_inner(), auth));
                grpc.ready().await.map_err(|e| {
                    ClientError::Rpc(GrpcStatus::unknown(format!("service was not ready: {e}")))
                })?;

                let mut request = tonic::Request::new(request);
                *request.metadata_mut() = metadata_map;
                if let Some(timeout) = timeout {
                    request.set_timeout(timeout);
                }

                let codec: ProstCodec<Req, Resp> = ProstCodec::default();
                let response = grpc
                    .unary(request, path, codec)
                    .await
                    .map_err(ClientError::from)?;
                Ok(response.into_inner())
            }
        })
        .await
    }

    /// Query the standard health-check service.
    ///
    /// Uses the registry's `Check` operation with its 5 second default
    /// timeout and returns the raw serving status.
    pub async fn health_check(&self) -> Result<ServingStatus> {
        let response: HealthCheckResponse = self
            .call(
                HEALTH_CHECK_OPERATION,
                HealthCheckRequest::default(),
                CallOptions::new(),
            )
            .await?;
        Ok(ServingStatus::from_wire(response.status))
    }

    /// Tear down the channel and discard the operation registry.
    ///
    /// Idempotent; safe to call when nothing was ever opened. The next
    /// access reopens from scratch.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !matches!(*state, ClientState::Uninitialized) {
            debug!(endpoint = %self.config.endpoint.uri(), "closing channel");
        }
        *state = ClientState::Uninitialized;
    }
}

impl Drop for ServiceClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state.lock().name())
            .finish()
    }
}
