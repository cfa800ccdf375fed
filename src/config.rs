//! Configuration schema and loading.
//!
//! The schema is plain data; semantic validation (network literals, header
//! name) happens when an [`IdentityGate`](crate::IdentityGate) is built from
//! it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigErrorKind};

/// Settings for resolving client identity behind trusted proxies.
///
/// Every field is optional in the TOML document. With the defaults the
/// feature is disabled and nothing is trusted.
///
/// # Examples
///
/// ```
/// use proxy_identity::ProxyIdentityConfig;
///
/// let config = ProxyIdentityConfig::from_toml_str(r#"
///     enable = true
///     set_scheme = true
///     trusted_networks = ["10.0.0.0/8", "fd00::/8"]
/// "#).unwrap();
///
/// assert!(config.enable);
/// assert!(!config.set_hostname);
/// assert_eq!(config.trusted_networks.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyIdentityConfig {
    /// Resolve forwarded identities at all.
    pub enable: bool,

    /// Override the hostname from `X-Forwarded-Host` / `X-Host`.
    pub set_hostname: bool,

    /// Override the scheme from `X-Forwarded-HTTPS` / `X-HTTPS` /
    /// `X-Forwarded-Proto`.
    pub set_scheme: bool,

    /// Override the port from `X-Forwarded-Port` / `X-Port`.
    pub set_port: bool,

    /// Reject requests whose socket peer is not a trusted proxy.
    pub forbid_if_peer_not_trusted: bool,

    /// Remove the consumed forwarded headers after a successful resolution.
    pub clear_headers: bool,

    /// Header carrying the forwarded chain, instead of `X-Forwarded-For`.
    pub header_name: Option<String>,

    /// Trusted proxy addresses and networks, e.g. `"10.0.0.0/8"`.
    pub trusted_networks: Vec<String>,
}

impl ProxyIdentityConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] of kind [`ConfigErrorKind::Parse`] when the
    /// document is not valid TOML or a field has the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(ConfigErrorKind::Parse, e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] of kind [`ConfigErrorKind::Io`] when the
    /// file cannot be read, or [`ConfigErrorKind::Parse`] as for
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                ConfigErrorKind::Io,
                format!("reading {}: {e}", path.display()),
            )
        })?;

        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded proxy identity configuration");
        Ok(config)
    }
}
