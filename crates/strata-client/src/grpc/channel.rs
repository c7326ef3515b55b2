//! gRPC channel construction.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint, Uri};

use crate::error::{ClientError, Result};
use crate::proxy::{GRPC_PROTOCOL, ProxyAuthentication};

/// Default port for secure (TLS) endpoints.
pub const DEFAULT_SECURE_PORT: u16 = 443;

/// Default port for insecure local/test endpoints.
pub const DEFAULT_INSECURE_PORT: u16 = 8000;

/// User agent sent with every call, identifying client and version.
pub const USER_AGENT: &str = concat!("strata-client-rust/", env!("CARGO_PKG_VERSION"));

/// A named service endpoint. Immutable after client construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    host: String,
    port: u16,
    insecure: bool,
}

impl ServiceEndpoint {
    /// A secure endpoint on the default TLS port.
    pub fn secure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SECURE_PORT,
            insecure: false,
        }
    }

    /// A plaintext endpoint on the default insecure port.
    ///
    /// Only meant for local and test servers.
    pub fn insecure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_INSECURE_PORT,
            insecure: true,
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this endpoint uses a plaintext channel.
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// The endpoint URI string, e.g. `https://platform.strata.dev:443`.
    pub fn uri(&self) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Builds transport channels for a [`ServiceEndpoint`].
///
/// Channels are created lazily: construction validates configuration
/// (endpoint URI, TLS trust store, proxy options) without any network
/// I/O, and the connection is established on first use.
#[derive(Debug, Clone)]
pub struct ChannelFactory {
    endpoint: ServiceEndpoint,
    proxy: ProxyAuthentication,
    connect_timeout: Option<Duration>,
}

impl ChannelFactory {
    /// Create a factory for the given endpoint.
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            endpoint,
            proxy: ProxyAuthentication::new(),
            connect_timeout: None,
        }
    }

    /// Use the given proxy registry when building channels.
    ///
    /// The registry is validated and serialized at build time; the
    /// resulting options are carried on [`GrpcChannel::options`] for a
    /// proxy-aware connector, not applied by the transport itself.
    pub fn proxy(mut self, proxy: ProxyAuthentication) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build a lazily connecting channel.
    ///
    /// Configuration problems (bad endpoint, unreadable CA bundle, failing
    /// proxy authorizer) surface here, before any network activity.
    pub fn build(&self) -> Result<GrpcChannel> {
        let uri: Uri = self
            .endpoint
            .uri()
            .parse()
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", self.endpoint.uri())))?;

        let mut endpoint = Endpoint::from(uri).tcp_nodelay(true);

        if !self.endpoint.is_insecure() {
            let tls = crate::tls::client_tls_config()?;
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| ClientError::Tls(e.to_string()))?;
        }

        endpoint = endpoint
            .user_agent(USER_AGENT)
            .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;

        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        let options = self.proxy.channel_options(GRPC_PROTOCOL)?;

        tracing::debug!(endpoint = %self.endpoint.uri(), "opening channel");
        Ok(GrpcChannel {
            inner: endpoint.connect_lazy(),
            endpoint: self.endpoint.clone(),
            options,
        })
    }
}

/// A transport channel to a service endpoint.
///
/// Cloning is cheap; all clones share the underlying connection.
#[derive(Clone)]
pub struct GrpcChannel {
    inner: Channel,
    endpoint: ServiceEndpoint,
    options: Vec<(String, String)>,
}

impl GrpcChannel {
    /// The endpoint this channel targets.
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// The channel options derived from the proxy registry.
    ///
    /// Informational: the underlying transport has no CONNECT-proxy
    /// support and does not consume these, so a proxy-aware connector
    /// must read them from here.
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Get the underlying tonic channel.
    pub fn into_inner(self) -> Channel {
        self.inner
    }

    /// Get a reference to the underlying tonic channel.
    pub fn inner(&self) -> &Channel {
        &self.inner
    }
}

impl std::fmt::Debug for GrpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcChannel")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish()
    }
}
