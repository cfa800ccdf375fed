use std::fmt;

use crate::chain::CandidateChain;
use crate::config::ProxyIdentityConfig;
use crate::error::{ConfigError, ConfigErrorKind};
use crate::logging::RequestLog;
use crate::request::{HeaderTable, Scheme, VirtualHostSelector};
use crate::resolver::{resolve, ResolvedIdentity};
use crate::scope::IdentityScope;
use crate::trust::ProxyTrustSet;

/// Header carrying the forwarded chain unless configured otherwise.
pub const DEFAULT_CHAIN_HEADER: &str = "X-Forwarded-For";

/// Request note holding the proxy path of a resolved request.
pub const PROXY_CHAIN_NOTE: &str = "proxy-chain";

const HOST_HEADERS: [&str; 2] = ["X-Forwarded-Host", "X-Host"];
const HTTPS_HEADERS: [&str; 2] = ["X-Forwarded-HTTPS", "X-HTTPS"];
const PROTO_HEADER: &str = "X-Forwarded-Proto";
const PORT_HEADERS: [&str; 2] = ["X-Forwarded-Port", "X-Port"];

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Nothing was resolved; the request keeps its identity as received.
    Decline,
    /// The socket peer is not trusted and the gate rejects such requests.
    Forbidden,
    /// The identity was overridden with the resolved one.
    Mutated(ResolvedIdentity),
}

impl Evaluation {
    /// Returns the applied identity, if any.
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        match self {
            Self::Mutated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Returns true if the request's identity was overridden.
    pub fn is_mutated(&self) -> bool {
        matches!(self, Self::Mutated(_))
    }
}

/// The compiled, immutable identity policy.
///
/// Built once from a [`ProxyIdentityConfig`] and shared by reference (or
/// `Arc`) with every request; evaluation never mutates the gate.
///
/// # Examples
///
/// ```
/// use proxy_identity::{Connection, IdentityGate, IdentityScope, ProxyIdentityConfig, RequestContext};
///
/// let gate = IdentityGate::from_config(&ProxyIdentityConfig {
///     enable: true,
///     trusted_networks: vec!["10.0.0.0/8".to_string()],
///     ..Default::default()
/// })
/// .unwrap();
///
/// let mut request = RequestContext::new("req-1", Connection::new("10.0.0.1".parse().unwrap()));
/// request.headers.append("X-Forwarded-For", "203.0.113.5, 10.0.0.2");
///
/// {
///     let mut scope = IdentityScope::open(&mut request);
///     let outcome = gate.evaluate(&mut scope);
///     assert!(outcome.is_mutated());
///     assert_eq!(scope.remote_addr().as_str(), "203.0.113.5");
/// }
///
/// assert_eq!(request.remote_addr().as_str(), "10.0.0.1");
/// ```
pub struct IdentityGate {
    enabled: bool,
    set_hostname: bool,
    set_scheme: bool,
    set_port: bool,
    forbid_untrusted_peer: bool,
    clear_headers: bool,
    header_name: String,
    trust: ProxyTrustSet,
    virtual_hosts: Option<Box<dyn VirtualHostSelector>>,
}

impl IdentityGate {
    /// Validates a configuration and compiles it into a gate.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: an invalid trusted network
    /// literal (see [`ProxyTrustSet::add`]) or a header name that is not an
    /// HTTP token.
    pub fn from_config(config: &ProxyIdentityConfig) -> Result<Self, ConfigError> {
        let trust = ProxyTrustSet::from_literals(&config.trusted_networks)?;

        let header_name = match &config.header_name {
            Some(name) => validate_header_name(name)?,
            None => DEFAULT_CHAIN_HEADER.to_string(),
        };

        tracing::info!(
            enabled = config.enable,
            networks = trust.len(),
            header = %header_name,
            "proxy identity gate ready"
        );

        Ok(Self {
            enabled: config.enable,
            set_hostname: config.set_hostname,
            set_scheme: config.set_scheme,
            set_port: config.set_port,
            forbid_untrusted_peer: config.forbid_if_peer_not_trusted,
            clear_headers: config.clear_headers,
            header_name,
            trust,
            virtual_hosts: None,
        })
    }

    /// Installs the selector consulted when a forwarded hostname is applied.
    pub fn with_virtual_hosts(mut self, selector: impl VirtualHostSelector + 'static) -> Self {
        self.virtual_hosts = Some(Box::new(selector));
        self
    }

    /// Returns the trusted proxy networks.
    pub fn trust(&self) -> &ProxyTrustSet {
        &self.trust
    }

    /// Returns the name of the header the forwarded chain is read from.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Returns true if the gate resolves identities at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolves the request's client identity and applies it to the scope.
    ///
    /// Request-time processing never fails: anything missing or unusable
    /// yields [`Evaluation::Decline`] and leaves the request untouched. The
    /// overrides stay in place until the scope is dropped.
    ///
    /// When the scheme override is enabled and an earlier evaluation within
    /// the same request already resolved a scheme, the cached scheme is
    /// re-applied and evaluation stops there.
    pub fn evaluate(&self, scope: &mut IdentityScope<'_>) -> Evaluation {
        if !self.enabled {
            return Evaluation::Decline;
        }

        let request_id = scope.request_id.clone();
        let peer = scope.connection().peer_addr();
        let log = RequestLog::new(&request_id, peer);

        if self.set_scheme {
            if let Some(cached) = scope.connection().scheme_cache().get() {
                scope.apply_scheme(cached);
                log.debug(format_args!("re-applied cached scheme {cached}"));
                return Evaluation::Decline;
            }
        }

        if !self.trust.contains(peer) {
            if self.forbid_untrusted_peer {
                log.warn(format_args!("rejecting request from untrusted peer"));
                return Evaluation::Forbidden;
            }
            log.debug(format_args!("peer is not a trusted proxy"));
            return Evaluation::Decline;
        }

        let Some((source, value)) = self.chain_value(&scope.headers) else {
            log.debug(format_args!("no {} header", self.header_name));
            return Evaluation::Decline;
        };

        let chain = CandidateChain::parse(&value);
        let identity = match resolve(&chain, &self.trust) {
            Ok(identity) => identity,
            Err(err) => {
                log.debug(format_args!("{source}: {err}"));
                return Evaluation::Decline;
            }
        };

        scope.apply_address(&identity);
        scope
            .notes
            .insert(PROXY_CHAIN_NOTE.to_string(), identity.proxy_list(peer));

        self.apply_overrides(scope, &log);

        if self.clear_headers {
            self.clear_consumed_headers(&mut scope.headers, source);
        }

        log.info(format_args!(
            "client {} resolved through {} proxy hop(s)",
            identity.client_address(),
            identity.hops()
        ));

        Evaluation::Mutated(identity)
    }

    fn apply_overrides(&self, scope: &mut IdentityScope<'_>, log: &RequestLog<'_>) {
        if self.set_hostname {
            if let Some(hostname) = forwarded_hostname(&scope.headers) {
                log.trace(format_args!("hostname -> {hostname}"));
                scope.apply_hostname(&hostname, self.virtual_hosts.as_deref());
            }
        }

        if self.set_scheme && forwarded_https(&scope.headers) {
            log.trace(format_args!("scheme -> https"));
            scope.apply_scheme(Scheme::Https);
        }

        if self.set_port {
            if let Some(port) = forwarded_port(&scope.headers) {
                log.trace(format_args!("port -> {port}"));
                scope.apply_port(port);
            }
        }
    }

    /// Reads the forwarded chain from the configured header, falling back
    /// to `X-Forwarded-For` when a different header is configured but absent.
    fn chain_value(&self, headers: &HeaderTable) -> Option<(&str, String)> {
        if let Some(value) = headers.get_combined(&self.header_name) {
            return Some((self.header_name.as_str(), value));
        }
        if self.header_name.eq_ignore_ascii_case(DEFAULT_CHAIN_HEADER) {
            return None;
        }
        headers
            .get_combined(DEFAULT_CHAIN_HEADER)
            .map(|value| (DEFAULT_CHAIN_HEADER, value))
    }

    fn clear_consumed_headers(&self, headers: &mut HeaderTable, chain_header: &str) {
        headers.remove(chain_header);

        let mut consulted: Vec<&str> = Vec::new();
        if self.set_hostname {
            consulted.extend(HOST_HEADERS);
        }
        if self.set_scheme {
            consulted.extend(HTTPS_HEADERS);
            consulted.push(PROTO_HEADER);
        }
        if self.set_port {
            consulted.extend(PORT_HEADERS);
        }

        for name in consulted {
            headers.remove(name);
        }
    }
}

impl fmt::Debug for IdentityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityGate")
            .field("enabled", &self.enabled)
            .field("set_hostname", &self.set_hostname)
            .field("set_scheme", &self.set_scheme)
            .field("set_port", &self.set_port)
            .field("forbid_untrusted_peer", &self.forbid_untrusted_peer)
            .field("clear_headers", &self.clear_headers)
            .field("header_name", &self.header_name)
            .field("trust", &self.trust)
            .field("virtual_hosts", &self.virtual_hosts.is_some())
            .finish()
    }
}

fn validate_header_name(name: &str) -> Result<String, ConfigError> {
    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_token_char) {
        return Err(ConfigError::new(
            ConfigErrorKind::InvalidHeaderName,
            format!("'{name}' is not a valid HTTP header name"),
        ));
    }
    Ok(name.to_string())
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Value set by the nearest proxy: the rightmost non-empty entry of the
/// first listed header that has one.
fn nearest_value(headers: &HeaderTable, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get_combined(name)?
            .rsplit(',')
            .map(str::trim)
            .find(|token| !token.is_empty())
            .map(str::to_string)
    })
}

fn forwarded_hostname(headers: &HeaderTable) -> Option<String> {
    nearest_value(headers, &HOST_HEADERS)
}

fn forwarded_https(headers: &HeaderTable) -> bool {
    if HTTPS_HEADERS.iter().any(|name| headers.contains(name)) {
        return nearest_value(headers, &HTTPS_HEADERS).is_some_and(|value| {
            value.eq_ignore_ascii_case("on") || value.eq_ignore_ascii_case("https")
        });
    }

    nearest_value(headers, &[PROTO_HEADER]).is_some_and(|value| value.eq_ignore_ascii_case("https"))
}

fn forwarded_port(headers: &HeaderTable) -> Option<u16> {
    nearest_value(headers, &PORT_HEADERS)?.parse().ok()
}
