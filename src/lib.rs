//! Client identity resolution behind trusted reverse proxies.
//!
//! When a server sits behind one or more reverse proxies, the socket peer of
//! every connection is a proxy, not the client. The proxies report the real
//! client in forwarded headers, but those headers can be forged by anyone.
//! This crate trusts them only when the socket peer is a configured proxy,
//! walks the forwarded chain past every trusted hop, and overrides the
//! request's perceived address (and optionally hostname, scheme and port)
//! for exactly the lifetime of that request.
//!
//! # Core Types
//!
//! - [`ProxyTrustSet`]: trusted proxy addresses and networks
//! - [`CandidateChain`]: address tokens parsed from a forwarded-for header
//! - [`resolve`]: walks a chain back to the client, yielding a [`ResolvedIdentity`]
//! - [`IdentityScope`]: overrides a request's identity and restores it on drop
//! - [`IdentityGate`]: the compiled configuration and per-request entry point
//!
//! # Examples
//!
//! ```
//! use proxy_identity::{Connection, Evaluation, IdentityGate, IdentityScope,
//!     ProxyIdentityConfig, RequestContext};
//!
//! let config = ProxyIdentityConfig::from_toml_str(r#"
//!     enable = true
//!     trusted_networks = ["10.0.0.0/8"]
//! "#).unwrap();
//! let gate = IdentityGate::from_config(&config).unwrap();
//!
//! let mut request = RequestContext::new("req-123", Connection::new("10.0.0.1".parse().unwrap()));
//! request.headers.append("X-Forwarded-For", "203.0.113.5, 10.1.2.3, 10.5.6.7");
//!
//! {
//!     let mut scope = IdentityScope::open(&mut request);
//!     match gate.evaluate(&mut scope) {
//!         Evaluation::Mutated(identity) => {
//!             assert_eq!(identity.client_address().as_str(), "203.0.113.5");
//!             assert_eq!(scope.remote_addr().as_str(), "203.0.113.5");
//!         }
//!         other => panic!("unexpected outcome: {other:?}"),
//!     }
//! }
//!
//! // The override ended with the scope.
//! assert_eq!(request.remote_addr().as_str(), "10.0.0.1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod config;
mod error;
mod gate;
mod literal;
mod logging;
mod request;
mod resolver;
mod scope;
mod trust;
pub mod web;

#[cfg(test)]
mod test_utils;

pub use chain::CandidateChain;
pub use config::ProxyIdentityConfig;
pub use error::{ConfigError, ConfigErrorKind, Forbidden, NoCandidate};
pub use gate::{Evaluation, IdentityGate, DEFAULT_CHAIN_HEADER, PROXY_CHAIN_NOTE};
pub use literal::{AddressFamily, AddressLiteral};
pub use logging::RequestLog;
pub use request::{Connection, HeaderTable, RequestContext, Scheme, SchemeCache, VirtualHostSelector};
pub use resolver::{resolve, ResolvedIdentity};
pub use scope::{IdentityOverrideRecord, IdentityScope};
pub use trust::{ProxyTrustSet, TrustedNetwork};
