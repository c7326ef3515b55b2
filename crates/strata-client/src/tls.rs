//! TLS trust-store resolution for secure channels.
//!
//! Secure channel construction resolves a root CA bundle from the
//! environment, falling back to the platform trust store. The bundle is
//! validated as PEM before being handed to the transport so a bad path
//! fails at channel-build time instead of on the first call.

use std::ffi::OsString;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use tonic::transport::{Certificate, ClientTlsConfig};

use crate::error::{ClientError, Result};

/// Environment variables checked, in order, for a root CA bundle path.
pub const CA_BUNDLE_ENV_VARS: [&str; 4] = [
    "STRATA_CA_BUNDLE",
    "SSL_CERT_FILE",
    "CURL_CA_BUNDLE",
    "GRPC_DEFAULT_SSL_ROOTS_FILE_PATH",
];

/// Resolve the root CA bundle path from the environment.
///
/// Returns the first non-empty variable from [`CA_BUNDLE_ENV_VARS`], or
/// `None` when none is set.
pub fn resolve_ca_bundle() -> Option<PathBuf> {
    resolve_ca_bundle_with(|name| std::env::var_os(name))
}

fn resolve_ca_bundle_with(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    CA_BUNDLE_ENV_VARS
        .iter()
        .find_map(|name| lookup(name).filter(|value| !value.is_empty()).map(PathBuf::from))
}

/// Build the TLS configuration for a secure channel.
///
/// Uses the environment-resolved CA bundle when one is set, otherwise the
/// platform's native trust store.
pub fn client_tls_config() -> Result<ClientTlsConfig> {
    match resolve_ca_bundle() {
        Some(path) => client_tls_config_from_bundle(&path),
        None => Ok(ClientTlsConfig::new().with_native_roots()),
    }
}

/// Build a TLS configuration trusting the certificates in a PEM bundle.
pub fn client_tls_config_from_bundle(path: &Path) -> Result<ClientTlsConfig> {
    let pem = std::fs::read(path).map_err(|e| {
        ClientError::Tls(format!("failed to read CA bundle {}: {e}", path.display()))
    })?;

    let mut reader = BufReader::new(Cursor::new(&pem));
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            ClientError::Tls(format!("failed to parse CA bundle {}: {e}", path.display()))
        })?;
    if certs.is_empty() {
        return Err(ClientError::Tls(format!(
            "no certificates found in CA bundle {}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), certs = certs.len(), "using CA bundle from environment");
    Ok(ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    // Self-signed test certificate, not trusted by anything.
    const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBhTCCASugAwIBAgIQIRi6zePL6mKjOipn+dNuaTAKBggqhkjOPQQDAjASMRAw\n\
DgYDVQQKEwdBY21lIENvMB4XDTE3MTAyMDE5NDMwNloXDTE4MTAyMDE5NDMwNlow\n\
EjEQMA4GA1UEChMHQWNtZSBDbzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABD0d\n\
7VNhbWvZLWPuj/RtHFjvtJBEwOkhbN/BnnE8rnZR8+sbwnc/KhCk3FhnpHZnQz7B\n\
5aETbbIgmuvewdjvSBSjYzBhMA4GA1UdDwEB/wQEAwICpDATBgNVHSUEDDAKBggr\n\
BgEFBQcDATAPBgNVHRMBAf8EBTADAQH/MCkGA1UdEQQiMCCCDmxvY2FsaG9zdDo1\n\
NDUzgg4xMjcuMC4wLjE6NTQ1MzAKBggqhkjOPQQDAgNIADBFAiEA2zpJEPQyz6/l\n\
Wf86aX6PepsntZv2GYlA5UpabfT2EZICICpJ5h/iI+i341gBmLiAFQOyTDT+/wQc\n\
6MF9+Yw1Yy0t\n\
-----END CERTIFICATE-----\n";

    fn lookup_from<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<OsString> + 'a {
        move |name| map.get(name).map(OsString::from)
    }

    #[test]
    fn test_resolution_order() {
        let mut env = HashMap::new();
        env.insert("CURL_CA_BUNDLE", "/etc/curl.pem");
        env.insert("SSL_CERT_FILE", "/etc/ssl.pem");
        assert_eq!(
            resolve_ca_bundle_with(lookup_from(&env)),
            Some(PathBuf::from("/etc/ssl.pem"))
        );

        env.insert("STRATA_CA_BUNDLE", "/etc/strata.pem");
        assert_eq!(
            resolve_ca_bundle_with(lookup_from(&env)),
            Some(PathBuf::from("/etc/strata.pem"))
        );
    }

    #[test]
    fn test_resolution_skips_empty_values() {
        let mut env = HashMap::new();
        env.insert("STRATA_CA_BUNDLE", "");
        env.insert("GRPC_DEFAULT_SSL_ROOTS_FILE_PATH", "/etc/grpc.pem");
        assert_eq!(
            resolve_ca_bundle_with(lookup_from(&env)),
            Some(PathBuf::from("/etc/grpc.pem"))
        );
    }

    #[test]
    fn test_resolution_unset() {
        let env = HashMap::new();
        assert_eq!(resolve_ca_bundle_with(lookup_from(&env)), None);
    }

    #[test]
    fn test_bundle_from_pem_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_PEM.as_bytes()).unwrap();

        let config = client_tls_config_from_bundle(file.path());
        assert!(config.is_ok());
    }

    #[test]
    fn test_bundle_missing_file() {
        let result = client_tls_config_from_bundle(Path::new("/nonexistent/ca.pem"));
        assert!(matches!(result, Err(ClientError::Tls(_))));
    }

    #[test]
    fn test_bundle_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a certificate").unwrap();

        let result = client_tls_config_from_bundle(file.path());
        assert!(matches!(result, Err(ClientError::Tls(_))));
    }
}
