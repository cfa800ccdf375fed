//! Running one request through the identity gate.
//!
//! # Integration Flow
//!
//! ```text
//! Accepted connection
//!   ↓
//! Framework-specific code builds RequestAdapter
//!   ↓
//! adapter.into_context(connection) → RequestContext
//!   ↓
//! process(gate, request, handler)
//!   ├─ IdentityScope::open   (snapshot)
//!   ├─ IdentityGate::evaluate
//!   ├─ handler(&mut request) (sees the resolved identity)
//!   └─ scope dropped         (restore, also on unwind)
//!   ↓
//! request.into_connection() → next keep-alive request
//! ```

use crate::error::Forbidden;
use crate::gate::{Evaluation, IdentityGate};
use crate::request::RequestContext;
use crate::scope::IdentityScope;

/// Evaluates `request` against `gate` and runs `handler` on the result.
///
/// The handler sees the overridden identity when the gate resolved one, and
/// the request as received otherwise. Every override is rolled back before
/// this function returns or while a panic from the handler unwinds.
///
/// # Errors
///
/// Returns [`Forbidden`] without running the handler when the socket peer is
/// not trusted and the gate is configured to reject such peers.
///
/// # Examples
///
/// ```
/// use proxy_identity::web::{process, RequestAdapter};
/// use proxy_identity::{Connection, IdentityGate, ProxyIdentityConfig};
///
/// let gate = IdentityGate::from_config(&ProxyIdentityConfig {
///     enable: true,
///     forbid_if_peer_not_trusted: true,
///     trusted_networks: vec!["10.0.0.0/8".to_string()],
///     ..Default::default()
/// })
/// .unwrap();
///
/// let mut adapter = RequestAdapter::new("req-1");
/// adapter.add_header("X-Forwarded-For", "203.0.113.5");
/// let mut request = adapter.into_context(Connection::new("10.0.0.1".parse().unwrap()));
///
/// let seen = process(&gate, &mut request, |req| req.remote_addr().to_string()).unwrap();
/// assert_eq!(seen, "203.0.113.5");
/// assert_eq!(request.remote_addr().as_str(), "10.0.0.1");
///
/// let mut stranger = RequestAdapter::new("req-2")
///     .into_context(Connection::new("192.0.2.1".parse().unwrap()));
/// assert!(process(&gate, &mut stranger, |_| ()).is_err());
/// ```
pub fn process<R>(
    gate: &IdentityGate,
    request: &mut RequestContext,
    handler: impl FnOnce(&mut RequestContext) -> R,
) -> Result<R, Forbidden> {
    let mut scope = IdentityScope::open(request);

    if let Evaluation::Forbidden = gate.evaluate(&mut scope) {
        return Err(Forbidden {
            peer: scope.connection().peer_addr(),
        });
    }

    Ok(handler(&mut *scope))
}
