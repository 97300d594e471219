//! Middleware layers for the gateway.
//!
//! - [`PropagateHeadersLayer`]: copies allow-listed headers into [`CallMetadata`].
//! - [`ErrorHandlingLayer`]: turns handler failures and panics into JSON error
//!   responses.
//!
//! ## Layer Stack Order
//!
//! Header propagation runs first, error handling wraps the routes:
//!
//! ```rust,ignore
//! use grpc_gateway_axum::{ErrorHandlingLayer, PropagateHeadersLayer};
//!
//! let app = Router::new()
//!     .route("/v1/get-param-in-header", get(handler))
//!     .layer(ErrorHandlingLayer::new(error_handler))
//!     .layer(PropagateHeadersLayer::new(allow_list));
//! ```
//!
//! [`GatewayConfig::apply`](crate::GatewayConfig::apply) does the same in one call.
//!
//! [`CallMetadata`]: crate::metadata::CallMetadata

mod propagate;
mod recover;

pub use propagate::{PropagateHeadersLayer, PropagateHeadersService};
pub use recover::{ErrorHandlingLayer, ErrorHandlingService};
