//! Request adapter for mapping HTTP requests to proxy-identity types.

use crate::request::{host_without_port, Connection, HeaderTable, RequestContext, Scheme};

/// Framework-agnostic request parts.
///
/// Holds plain owned data so that any server can fill it in, then hands it
/// to [`into_context`](Self::into_context) together with the connection the
/// request arrived on. With the `http` feature enabled,
/// [`from_http_request`](Self::from_http_request) reads an `http::Request`.
///
/// # Examples
///
/// ```
/// use proxy_identity::web::RequestAdapter;
/// use proxy_identity::Connection;
///
/// let mut adapter = RequestAdapter::new("req-12345");
/// adapter.add_header("Host", "Shop.Example:8080");
/// adapter.add_header("X-Forwarded-For", "203.0.113.5");
///
/// let request = adapter.into_context(Connection::new("10.0.0.1".parse().unwrap()));
/// assert_eq!(request.request_id, "req-12345");
/// assert_eq!(request.hostname.as_deref(), Some("shop.example"));
/// assert_eq!(request.remote_addr().as_str(), "10.0.0.1");
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    request_id: String,
    headers: HeaderTable,
    scheme: Scheme,
    port: Option<u16>,
}

impl RequestAdapter {
    /// Creates an adapter for a plain HTTP request with no headers.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            headers: HeaderTable::new(),
            scheme: Scheme::Http,
            port: None,
        }
    }

    /// Adds a header line.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.append(name, value);
    }

    /// Sets the scheme the request was received with.
    pub fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = scheme;
    }

    /// Sets the local port the request was received on.
    ///
    /// Defaults to the scheme's well-known port.
    pub fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the headers collected so far.
    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Returns the lowercased hostname from the `Host` header, port removed.
    pub fn hostname(&self) -> Option<String> {
        self.headers.get("Host").and_then(host_without_port)
    }

    /// Builds the request context for a request on `connection`.
    pub fn into_context(self, connection: Connection) -> RequestContext {
        let hostname = self.hostname();
        let mut request = RequestContext::new(self.request_id, connection);
        request.headers = self.headers;
        request.hostname = hostname;
        request.scheme = self.scheme;
        request.port = self.port.unwrap_or_else(|| self.scheme.default_port());
        request
    }
}

#[cfg(feature = "http")]
impl RequestAdapter {
    /// Collects the parts of an `http::Request`.
    ///
    /// Header values that are not visible ASCII are skipped. The scheme and
    /// port come from the request URI when it is absolute.
    pub fn from_http_request<B>(request: &http::Request<B>, request_id: impl Into<String>) -> Self {
        let mut adapter = Self::new(request_id);

        for (name, value) in request.headers() {
            if let Ok(value) = value.to_str() {
                adapter.add_header(name.as_str(), value);
            }
        }

        if request.uri().scheme_str() == Some("https") {
            adapter.set_scheme(Scheme::Https);
        }
        if let Some(port) = request.uri().port_u16() {
            adapter.set_port(port);
        }

        adapter
    }
}
