//! Scoped identity overrides with guaranteed rollback.
//!
//! An [`IdentityScope`] is opened over a request before any identity field is
//! touched. It snapshots everything an override may change and restores that
//! snapshot when it is dropped, whichever way processing ends: normal
//! return, early return through `?`, or a panic unwinding through the
//! handler. A keep-alive connection therefore never carries one request's
//! forwarded identity into the next.

use std::ops::{Deref, DerefMut};

use crate::literal::AddressLiteral;
use crate::logging::RequestLog;
use crate::request::{host_without_port, RequestContext, Scheme, VirtualHostSelector};
use crate::resolver::ResolvedIdentity;

const HOST_HEADER: &str = "Host";

/// Snapshot of a request's identity taken when a scope is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOverrideRecord {
    remote: AddressLiteral,
    hostname: Option<String>,
    host_lines: Vec<(String, String)>,
    virtual_host: Option<String>,
    scheme: Scheme,
    port: u16,
    cached_scheme: Option<Scheme>,
}

impl IdentityOverrideRecord {
    fn capture(request: &RequestContext) -> Self {
        Self {
            remote: request.remote_addr().clone(),
            hostname: request.hostname.clone(),
            host_lines: request.headers.lines(HOST_HEADER),
            virtual_host: request.virtual_host.clone(),
            scheme: request.scheme,
            port: request.port,
            cached_scheme: request.connection().scheme_cache().get(),
        }
    }

    /// Returns the remote address before any override.
    pub fn remote_addr(&self) -> &AddressLiteral {
        &self.remote
    }

    /// Returns the hostname before any override.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Returns the scheme before any override.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the port before any override.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Exclusive access to a request while its identity may be overridden.
///
/// Dereferences to the [`RequestContext`] so handlers can run against the
/// scope directly.
///
/// # Examples
///
/// ```
/// use proxy_identity::{Connection, IdentityScope, RequestContext, Scheme};
///
/// let mut request = RequestContext::new("req-1", Connection::new("10.0.0.1".parse().unwrap()));
///
/// {
///     let mut scope = IdentityScope::open(&mut request);
///     scope.apply_scheme(Scheme::Https);
///     scope.apply_port(443);
///     assert_eq!(scope.scheme, Scheme::Https);
/// }
///
/// assert_eq!(request.scheme, Scheme::Http);
/// assert_eq!(request.port, 80);
/// ```
#[derive(Debug)]
pub struct IdentityScope<'r> {
    request: &'r mut RequestContext,
    record: IdentityOverrideRecord,
    host_overridden: bool,
}

impl<'r> IdentityScope<'r> {
    /// Snapshots the request's identity and opens a scope over it.
    pub fn open(request: &'r mut RequestContext) -> Self {
        let record = IdentityOverrideRecord::capture(request);
        Self {
            request,
            record,
            host_overridden: false,
        }
    }

    /// Returns the snapshot this scope will restore.
    pub fn record(&self) -> &IdentityOverrideRecord {
        &self.record
    }

    /// Returns a logger tagged with this request's ID and socket peer.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(
            &self.request.request_id,
            self.request.connection().peer_addr(),
        )
    }

    /// Replaces the perceived client address with the resolved one.
    pub fn apply_address(&mut self, resolved: &ResolvedIdentity) {
        self.request
            .connection_mut()
            .set_remote(resolved.client_address().clone());
    }

    /// Replaces the hostname and the `Host` header, then re-selects the
    /// virtual host when a selector is given.
    ///
    /// The `Host` header receives `host` as given. The hostname and the
    /// selector see it lowercased with any port removed, the same form
    /// [`RequestAdapter`](crate::web::RequestAdapter) derives from `Host`.
    pub fn apply_hostname(&mut self, host: &str, selector: Option<&dyn VirtualHostSelector>) {
        let hostname = host_without_port(host).unwrap_or_else(|| host.trim().to_ascii_lowercase());

        self.host_overridden = true;
        self.request.headers.set(HOST_HEADER, host);

        if let Some(selector) = selector {
            self.request.virtual_host = selector.select(&hostname);
        }
        self.request.hostname = Some(hostname);
    }

    /// Replaces the scheme and remembers it on the connection for the rest
    /// of this request.
    pub fn apply_scheme(&mut self, scheme: Scheme) {
        self.request.scheme = scheme;
        self.request
            .connection_mut()
            .scheme_cache_mut()
            .set(Some(scheme));
    }

    /// Replaces the port.
    pub fn apply_port(&mut self, port: u16) {
        self.request.port = port;
    }

    /// Puts every field back to the snapshot.
    ///
    /// Safe to call any number of times; the scope calls it once more when
    /// dropped.
    pub fn restore(&mut self) {
        let record = &self.record;
        let request = &mut *self.request;

        request.connection_mut().set_remote(record.remote.clone());
        request
            .connection_mut()
            .scheme_cache_mut()
            .set(record.cached_scheme);
        request.hostname = record.hostname.clone();
        request.virtual_host = record.virtual_host.clone();
        request.scheme = record.scheme;
        request.port = record.port;

        if self.host_overridden {
            request.headers.replace_lines(HOST_HEADER, &record.host_lines);
        }
    }
}

impl Deref for IdentityScope<'_> {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &*self.request
    }
}

impl DerefMut for IdentityScope<'_> {
    fn deref_mut(&mut self) -> &mut RequestContext {
        &mut *self.request
    }
}

impl Drop for IdentityScope<'_> {
    fn drop(&mut self) {
        self.restore();
        self.log().trace(format_args!(
            "identity restored to {}",
            self.record.remote
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CandidateChain;
    use crate::request::Connection;
    use crate::resolver::resolve;
    use crate::trust::ProxyTrustSet;

    fn request() -> RequestContext {
        let mut request = RequestContext::new("req-1", Connection::new("10.0.0.1".parse().unwrap()));
        request.headers.append("Host", "internal.local");
        request.hostname = Some("internal.local".to_string());
        request.virtual_host = Some("default".to_string());
        request
    }

    fn resolved(header: &str) -> ResolvedIdentity {
        let trust = ProxyTrustSet::from_literals(["10.0.0.0/8"]).unwrap();
        resolve(&CandidateChain::parse(header), &trust).unwrap()
    }

    #[test]
    fn record_captures_pre_override_values() {
        let mut request = request();
        let scope = IdentityScope::open(&mut request);
        let record = scope.record();

        assert_eq!(record.remote_addr().as_str(), "10.0.0.1");
        assert_eq!(record.hostname(), Some("internal.local"));
        assert_eq!(record.scheme(), Scheme::Http);
        assert_eq!(record.port(), 80);
    }

    #[test]
    fn drop_restores_every_field() {
        let mut request = request();
        let before = request.clone();

        {
            let selector = |_: &str| Some("public".to_string());
            let mut scope = IdentityScope::open(&mut request);
            scope.apply_address(&resolved("203.0.113.5, 10.0.0.2"));
            scope.apply_hostname("www.example.org", Some(&selector));
            scope.apply_scheme(Scheme::Https);
            scope.apply_port(8443);

            assert_eq!(scope.remote_addr().as_str(), "203.0.113.5");
            assert_eq!(scope.hostname.as_deref(), Some("www.example.org"));
            assert_eq!(scope.headers.get("host"), Some("www.example.org"));
            assert_eq!(scope.virtual_host.as_deref(), Some("public"));
            assert_eq!(scope.connection().scheme_cache().get(), Some(Scheme::Https));
            assert_eq!(scope.port, 8443);
        }

        assert_eq!(request, before);
    }

    #[test]
    fn restore_without_overrides_is_a_no_op() {
        let mut request = request();
        let before = request.clone();

        let mut scope = IdentityScope::open(&mut request);
        scope.restore();
        scope.restore();
        drop(scope);

        assert_eq!(request, before);
    }

    #[test]
    fn restore_without_overrides_keeps_duplicate_host_lines() {
        let mut request = request();
        request.headers.append("Accept", "*/*");
        request.headers.append("host", "b.example");
        let before = request.clone();

        drop(IdentityScope::open(&mut request));

        assert_eq!(request, before);
    }

    #[test]
    fn hostname_override_restores_every_host_line() {
        let mut request = request();
        request.headers.append("Accept", "*/*");
        request.headers.append("host", "b.example");
        let before = request.clone();

        {
            let mut scope = IdentityScope::open(&mut request);
            scope.apply_hostname("www.example.org", None);
            assert_eq!(scope.headers.get_all("Host").collect::<Vec<_>>(), ["www.example.org"]);
        }

        assert_eq!(request, before);
    }

    #[test]
    fn hostname_is_normalised_for_virtual_host_selection() {
        let mut request = request();
        let selector = |h: &str| (h == "shop.example").then(|| "shop".to_string());
        let mut scope = IdentityScope::open(&mut request);
        scope.apply_hostname("Shop.Example:8443", Some(&selector));

        assert_eq!(scope.hostname.as_deref(), Some("shop.example"));
        assert_eq!(scope.virtual_host.as_deref(), Some("shop"));
        assert_eq!(scope.headers.get("Host"), Some("Shop.Example:8443"));
    }

    #[test]
    fn restore_is_idempotent_after_partial_overrides() {
        let mut request = request();
        let before = request.clone();

        let mut scope = IdentityScope::open(&mut request);
        scope.apply_port(9000);
        scope.restore();
        assert_eq!(scope.port, 80);
        scope.restore();
        drop(scope);

        assert_eq!(request, before);
    }

    #[test]
    fn missing_host_header_is_removed_again() {
        let mut request = RequestContext::new("req-2", Connection::new("10.0.0.1".parse().unwrap()));

        {
            let mut scope = IdentityScope::open(&mut request);
            scope.apply_hostname("example.org", None);
            assert!(scope.headers.contains("Host"));
            assert!(scope.virtual_host.is_none());
        }

        assert!(!request.headers.contains("Host"));
        assert!(request.hostname.is_none());
    }

    #[test]
    fn peer_address_is_never_overridden() {
        let mut request = request();
        let mut scope = IdentityScope::open(&mut request);
        scope.apply_address(&resolved("198.51.100.1"));

        assert_eq!(scope.connection().peer_addr().to_string(), "10.0.0.1");
        assert_eq!(scope.remote_addr().as_str(), "198.51.100.1");
    }
}
