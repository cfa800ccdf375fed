//! The request and connection state the identity overrides act on.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use crate::literal::AddressLiteral;

/// Request scheme as perceived by handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl Scheme {
    /// Returns the lowercase scheme name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Returns the scheme's well-known port.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forwarded scheme remembered for the lifetime of one logical request.
///
/// Anyone may read the cache; only an identity scope writes or resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemeCache {
    scheme: Option<Scheme>,
}

impl SchemeCache {
    /// Returns the cached scheme, if one was resolved for this request.
    pub fn get(&self) -> Option<Scheme> {
        self.scheme
    }

    pub(crate) fn set(&mut self, scheme: Option<Scheme>) {
        self.scheme = scheme;
    }
}

/// A client connection, possibly carrying several requests (keep-alive).
///
/// The socket peer address is fixed when the connection is accepted. The
/// perceived remote address starts out equal to it and is the field identity
/// overrides replace for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    peer_addr: IpAddr,
    remote: AddressLiteral,
    scheme_cache: SchemeCache,
}

impl Connection {
    /// Creates a connection accepted from `peer_addr`.
    pub fn new(peer_addr: IpAddr) -> Self {
        Self {
            peer_addr,
            remote: AddressLiteral::from(peer_addr),
            scheme_cache: SchemeCache::default(),
        }
    }

    /// Returns the address of the socket peer. Never overridden.
    pub fn peer_addr(&self) -> IpAddr {
        self.peer_addr
    }

    /// Returns the remote address handlers should treat as the client.
    pub fn remote_addr(&self) -> &AddressLiteral {
        &self.remote
    }

    /// Returns the connection's forwarded-scheme cache.
    pub fn scheme_cache(&self) -> &SchemeCache {
        &self.scheme_cache
    }

    pub(crate) fn set_remote(&mut self, remote: AddressLiteral) {
        self.remote = remote;
    }

    pub(crate) fn scheme_cache_mut(&mut self) -> &mut SchemeCache {
        &mut self.scheme_cache
    }
}

/// Request headers with case-insensitive names and repeatable entries.
///
/// # Examples
///
/// ```
/// use proxy_identity::HeaderTable;
///
/// let mut headers = HeaderTable::new();
/// headers.append("X-Forwarded-For", "203.0.113.5");
/// headers.append("x-forwarded-for", "10.0.0.2");
///
/// assert_eq!(headers.get("X-FORWARDED-FOR"), Some("203.0.113.5"));
/// assert_eq!(
///     headers.get_combined("X-Forwarded-For").as_deref(),
///     Some("203.0.113.5, 10.0.0.2")
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: Vec<(String, String)>,
}

impl HeaderTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, keeping any existing entries of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every entry named `name` with a single entry.
    ///
    /// The first existing entry keeps its position; otherwise the entry is
    /// appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut pending = Some(value.into());

        self.entries.retain_mut(|(n, v)| {
            if !n.eq_ignore_ascii_case(&name) {
                return true;
            }
            match pending.take() {
                Some(value) => {
                    *v = value;
                    true
                }
                None => false,
            }
        });

        if let Some(value) = pending {
            self.entries.push((name, value));
        }
    }

    /// Replaces every entry named `name` with `lines`, kept verbatim.
    ///
    /// The lines take the position of the first existing entry; otherwise
    /// they are appended. Empty `lines` removes the name.
    pub(crate) fn replace_lines(&mut self, name: &str, lines: &[(String, String)]) {
        let at = self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
            .unwrap_or(self.entries.len());
        self.remove(name);
        self.entries.splice(at..at, lines.iter().cloned());
    }

    /// Returns every entry named `name` in arrival order, names as received.
    pub(crate) fn lines(&self, name: &str) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .cloned()
            .collect()
    }

    /// Removes every entry named `name`, returning whether any existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over every value for `name` in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Joins every value for `name` with `", "`, as list-valued headers
    /// spread over several lines are combined.
    pub fn get_combined(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self.get_all(name).collect();
        (!values.is_empty()).then(|| values.join(", "))
    }

    /// Returns true if at least one entry is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Lowercased host name of a `Host`-style value, port removed.
///
/// Bracketed IPv6 literals keep their brackets.
pub(crate) fn host_without_port(host: &str) -> Option<String> {
    let host = host.trim();
    let name = if host.starts_with('[') {
        let end = host.find(']')?;
        &host[..=end]
    } else {
        host.split(':').next().unwrap_or(host)
    };

    (!name.is_empty()).then(|| name.to_ascii_lowercase())
}

/// Per-request state visible to handlers.
///
/// The connection is borrowed into the request for its lifetime and handed
/// back with [`into_connection`](Self::into_connection) so the next request
/// on a keep-alive connection starts from whatever the previous one left
/// behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    /// Incoming request headers
    pub headers: HeaderTable,
    /// Hostname the request was addressed to
    pub hostname: Option<String>,
    /// Virtual host selected for `hostname`
    pub virtual_host: Option<String>,
    /// Scheme handlers should treat the request as using
    pub scheme: Scheme,
    /// Server port handlers should treat the request as addressed to
    pub port: u16,
    /// Free-form per-request annotations
    pub notes: HashMap<String, String>,
    connection: Connection,
}

impl RequestContext {
    /// Creates a request on `connection` with empty headers, plain HTTP on
    /// port 80, and no hostname.
    pub fn new(request_id: impl Into<String>, connection: Connection) -> Self {
        Self {
            request_id: request_id.into(),
            headers: HeaderTable::new(),
            hostname: None,
            virtual_host: None,
            scheme: Scheme::Http,
            port: Scheme::Http.default_port(),
            notes: HashMap::new(),
            connection,
        }
    }

    /// Returns the connection the request arrived on.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the remote address handlers should treat as the client.
    pub fn remote_addr(&self) -> &AddressLiteral {
        self.connection.remote_addr()
    }

    /// Ends the request and hands the connection back for reuse.
    pub fn into_connection(self) -> Connection {
        self.connection
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }
}

/// Chooses the virtual host serving a hostname.
///
/// Hosts with name-based virtual hosting install one on the gate so that a
/// forwarded hostname re-selects the vhost. Any `Fn(&str) -> Option<String>`
/// qualifies.
pub trait VirtualHostSelector: Send + Sync {
    /// Returns the virtual host for `hostname`, or `None` for the default.
    fn select(&self, hostname: &str) -> Option<String>;
}

impl<F> VirtualHostSelector for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn select(&self, hostname: &str) -> Option<String> {
        self(hostname)
    }
}
