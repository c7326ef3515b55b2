//! Bearer-token credentials for per-call authentication.
//!
//! The transport asks a [`TokenProvider`] for the current token at the
//! moment each call goes out, never at channel-construction time, so
//! refresh and expiry stay the provider's concern.

use std::sync::Arc;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;

use crate::error::{ClientError, Result};

/// Environment variable consulted by [`EnvTokenProvider::new`].
pub const TOKEN_ENV_VAR: &str = "STRATA_TOKEN";

/// Supplies the current bearer token for outgoing calls.
pub trait TokenProvider: Send + Sync {
    /// The token to attach to the next call.
    fn token(&self) -> Result<String>;
}

/// A fixed token, useful for service accounts and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider that always returns the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    /// Read from the default [`TOKEN_ENV_VAR`] variable.
    pub fn new() -> Self {
        Self::from_var(TOKEN_ENV_VAR)
    }

    /// Read from a custom environment variable.
    pub fn from_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for EnvTokenProvider {
    fn token(&self) -> Result<String> {
        std::env::var(&self.var)
            .map_err(|_| ClientError::Auth(format!("environment variable {} is not set", self.var)))
    }
}

/// Interceptor injecting `authorization: Bearer <token>` into each call.
///
/// With no provider configured it passes requests through untouched, so
/// the channel plumbing stays uniform for unauthenticated (local/test)
/// endpoints.
#[derive(Clone)]
pub(crate) struct AuthInterceptor {
    provider: Option<Arc<dyn TokenProvider>>,
}

impl AuthInterceptor {
    pub(crate) fn new(provider: Option<Arc<dyn TokenProvider>>) -> Self {
        Self { provider }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> std::result::Result<tonic::Request<()>, tonic::Status> {
        let Some(provider) = &self.provider else {
            return Ok(request);
        };
        let token = provider
            .token()
            .map_err(|e| tonic::Status::unauthenticated(e.to_string()))?;
        let value: MetadataValue<Ascii> = format!("Bearer {token}")
            .parse()
            .map_err(|_| tonic::Status::unauthenticated("bearer token is not valid ASCII"))?;
        request.metadata_mut().insert("authorization", value);
        Ok(request)
    }
}
