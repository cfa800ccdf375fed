//! Web framework integration surface.
//!
//! This module is the boundary between HTTP servers and the identity core.
//! It contains no framework-specific code; servers fill a [`RequestAdapter`]
//! from whatever request type they have, attach the connection, and run the
//! result through [`process`].
//!
//! # Example Flow
//!
//! ```ignore
//! // In a framework-specific integration (e.g., hyper, axum):
//! let mut connection = Connection::new(peer_addr);
//!
//! loop {
//!     let adapter = RequestAdapter::from_http_request(&http_req, next_request_id());
//!     let mut request = adapter.into_context(connection);
//!
//!     let response = match process(&gate, &mut request, |req| route(req)) {
//!         Ok(response) => response,
//!         Err(Forbidden { .. }) => forbidden_response(),
//!     };
//!
//!     connection = request.into_connection();
//! }
//! ```

mod adapter;
mod pipeline;

pub use adapter::RequestAdapter;
pub use pipeline::process;
