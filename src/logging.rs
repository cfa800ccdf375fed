use std::fmt;
use std::net::IpAddr;

/// A request-scoped logging handle.
///
/// Every event carries the request ID and the socket peer address as
/// structured fields, so identity decisions for one request can be followed
/// through the log even after the perceived client address has changed.
///
/// ```
/// use proxy_identity::RequestLog;
///
/// let log = RequestLog::new("req-7", "10.0.0.1".parse().unwrap());
/// log.debug(format_args!("peer is not a trusted proxy"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
    peer: IpAddr,
}

impl<'a> RequestLog<'a> {
    /// Creates a logger for one request.
    pub fn new(request_id: &'a str, peer: IpAddr) -> Self {
        Self { request_id, peer }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Returns the socket peer address associated with this logger.
    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, peer = %self.peer, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, peer = %self.peer, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, peer = %self.peer, "{}", args);
    }

    /// Logs a trace-level message.
    pub fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(request_id = %self.request_id, peer = %self.peer, "{}", args);
    }
}
