//! Proxy registration and proxy authorization headers.
//!
//! Deployments behind an authenticating forward proxy register the proxy
//! URL per protocol and, optionally, an authorizer that produces the
//! headers the proxy expects on its CONNECT request. The channel factory
//! validates both and serializes them into channel options before any
//! network activity happens.
//!
//! The transport itself does not consume these options: tonic has no
//! CONNECT-proxy support, so they are exposed through
//! [`GrpcChannel::options`](crate::GrpcChannel::options) for a
//! proxy-aware connector to pick up.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::{ClientError, Result};

/// Channel option key carrying the proxy URL.
pub const PROXY_URL_OPTION: &str = "grpc.http_proxy";

/// Channel option key carrying the serialized proxy CONNECT headers.
///
/// The transport accepts a single flat string for this option, so the
/// headers are newline-joined `"key: value"` lines.
pub const CONNECT_HEADERS_OPTION: &str = "grpc.http_connect_headers";

/// Protocol name under which the gRPC transport looks up its proxy.
pub const GRPC_PROTOCOL: &str = "grpc";

/// Supplies authorization headers for the proxy CONNECT request.
///
/// Invoked at channel-build time; a failure here is a configuration
/// error and surfaces before any network I/O.
pub trait ProxyAuthorizer: Send + Sync {
    /// Produce the CONNECT headers, in the order they should be sent.
    fn headers(&self) -> Result<Vec<(String, String)>>;
}

impl<F> ProxyAuthorizer for F
where
    F: Fn() -> Result<Vec<(String, String)>> + Send + Sync,
{
    fn headers(&self) -> Result<Vec<(String, String)>> {
        self()
    }
}

/// Registry of per-protocol proxy URLs and an optional authorizer.
#[derive(Clone, Default)]
pub struct ProxyAuthentication {
    proxies: HashMap<String, String>,
    authorizer: Option<Arc<dyn ProxyAuthorizer>>,
}

impl ProxyAuthentication {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proxy URL for a protocol (e.g. `"grpc"`, `"https"`).
    ///
    /// The URL is validated here; the registered string is passed through
    /// to the transport verbatim.
    pub fn register_proxy(&mut self, protocol: &str, proxy_url: &str) -> Result<()> {
        Url::parse(proxy_url)
            .map_err(|e| ClientError::Proxy(format!("invalid proxy URL {proxy_url:?}: {e}")))?;
        self.proxies
            .insert(protocol.to_ascii_lowercase(), proxy_url.to_string());
        Ok(())
    }

    /// Register the authorizer supplying proxy CONNECT headers.
    pub fn register_authorizer(&mut self, authorizer: Arc<dyn ProxyAuthorizer>) {
        self.authorizer = Some(authorizer);
    }

    /// The registered proxy URL for a protocol, if any.
    pub fn proxy_url(&self, protocol: &str) -> Option<&str> {
        self.proxies
            .get(&protocol.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Build the channel options for a protocol.
    ///
    /// No registered proxy yields no options. A registered proxy yields the
    /// proxy-URL option and, when an authorizer is registered and returns a
    /// non-empty header set, a single connect-headers option holding the
    /// newline-joined serialization.
    pub fn channel_options(&self, protocol: &str) -> Result<Vec<(String, String)>> {
        let Some(proxy_url) = self.proxy_url(protocol) else {
            return Ok(Vec::new());
        };

        let mut options = vec![(PROXY_URL_OPTION.to_string(), proxy_url.to_string())];
        if let Some(authorizer) = &self.authorizer {
            let headers = authorizer.headers()?;
            if !headers.is_empty() {
                let serialized = headers
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                tracing::debug!(proxy_url, headers = headers.len(), "attaching proxy CONNECT headers");
                options.push((CONNECT_HEADERS_OPTION.to_string(), serialized));
            }
        }
        Ok(options)
    }
}

impl fmt::Debug for ProxyAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAuthentication")
            .field("proxies", &self.proxies)
            .field("has_authorizer", &self.authorizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_proxy_yields_no_options() {
        let proxy = ProxyAuthentication::new();
        assert_eq!(proxy.channel_options(GRPC_PROTOCOL).unwrap(), vec![]);
    }

    #[test]
    fn test_proxy_without_authorizer() {
        let mut proxy = ProxyAuthentication::new();
        proxy
            .register_proxy(GRPC_PROTOCOL, "http://proxy.test:8888")
            .unwrap();

        let options = proxy.channel_options(GRPC_PROTOCOL).unwrap();
        assert_eq!(
            options,
            vec![(
                PROXY_URL_OPTION.to_string(),
                "http://proxy.test:8888".to_string()
            )]
        );
    }

    #[test]
    fn test_proxy_with_authorizer_serializes_headers() {
        let mut proxy = ProxyAuthentication::new();
        proxy
            .register_proxy(GRPC_PROTOCOL, "http://proxy.test:8888")
            .unwrap();
        proxy.register_authorizer(Arc::new(|| -> Result<Vec<(String, String)>> {
            Ok(vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string()),
            ])
        }));

        let options = proxy.channel_options(GRPC_PROTOCOL).unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[1].0, CONNECT_HEADERS_OPTION);
        assert_eq!(options[1].1, "A: 1\nB: 2");
    }

    #[test]
    fn test_authorizer_failure_is_configuration_error() {
        let mut proxy = ProxyAuthentication::new();
        proxy
            .register_proxy(GRPC_PROTOCOL, "http://proxy.test:8888")
            .unwrap();
        proxy.register_authorizer(Arc::new(|| -> Result<Vec<(String, String)>> {
            Err(ClientError::Proxy("credential store offline".to_string()))
        }));

        let result = proxy.channel_options(GRPC_PROTOCOL);
        assert!(matches!(result, Err(ClientError::Proxy(_))));
    }

    #[test]
    fn test_empty_authorizer_headers_skip_option() {
        let mut proxy = ProxyAuthentication::new();
        proxy
            .register_proxy(GRPC_PROTOCOL, "http://proxy.test:8888")
            .unwrap();
        proxy.register_authorizer(Arc::new(|| -> Result<Vec<(String, String)>> { Ok(Vec::new()) }));

        let options = proxy.channel_options(GRPC_PROTOCOL).unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].0, PROXY_URL_OPTION);
    }

    #[test]
    fn test_invalid_proxy_url_rejected() {
        let mut proxy = ProxyAuthentication::new();
        let result = proxy.register_proxy(GRPC_PROTOCOL, "not a url");
        assert!(matches!(result, Err(ClientError::Proxy(_))));
    }

    #[test]
    fn test_proxy_for_other_protocol_ignored() {
        let mut proxy = ProxyAuthentication::new();
        proxy
            .register_proxy("https", "http://proxy.test:8888")
            .unwrap();

        assert_eq!(proxy.channel_options(GRPC_PROTOCOL).unwrap(), vec![]);
    }
}
