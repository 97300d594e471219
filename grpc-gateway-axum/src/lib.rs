//! # gRPC Gateway for Axum
//!
//! Middleware for serving gRPC-style services over plain HTTP/JSON with
//! [Axum](https://github.com/tokio-rs/axum).
//!
//! Business handlers are written against `tonic` types: they take a
//! `tonic::Request<T>` and fail with a `tonic::Status`. This crate does the
//! translation around them:
//!
//! - **Header propagation:** allow-listed HTTP headers become call metadata
//!   ([`metadata`], [`PropagateHeadersLayer`]).
//! - **Status translation:** every RPC status code has a fixed HTTP status and,
//!   for a few codes, a fixed client-facing message ([`status`]).
//! - **Error classification:** any failure becomes an [`ErrorRecord`] through a
//!   pluggable [`ErrorHandler`] ([`handler`]).
//! - **Panic recovery:** panics become JSON error responses when nothing was
//!   sent yet, and abort the body cleanly when something was
//!   ([`ErrorHandlingLayer`]).
//! - **Serialization:** error records render as
//!   `{"error","code","message","details"}` with a static fallback
//!   ([`response`]).
//!
//! ## Getting Started
//!
//! ```rust,ignore
//! use grpc_gateway_axum::prelude::*;
//!
//! let app = GatewayConfig::default().apply(
//!     Router::new().route("/v1/items/{id}", get(get_item)),
//! );
//! ```
//!
//! The `grpc-gateway-axum-examples` crate has a complete service.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod intercept;
pub mod layer;
pub mod metadata;
pub mod panic;
pub mod response;
pub mod status;

pub use config::GatewayConfig;
pub use error::{ErrorCategory, ErrorRecord, HttpStatusError, PanicError, RpcFailure};
pub use handler::{DefaultErrorHandler, ErrorHandler, RequestInfo, logging};
pub use layer::{ErrorHandlingLayer, PropagateHeadersLayer};
pub use metadata::{CallMetadata, HeaderAllowList};
pub use status::{Code, StatusTranslation, translate};

// Re-export several crates
pub use serde;
pub use tonic;

pub mod prelude {
    //! A prelude for `grpc-gateway-axum` providing the most common types.
    pub use crate::bridge::{JsonBody, reply, required_metadata};
    pub use crate::config::GatewayConfig;
    pub use crate::error::{ErrorRecord, HttpStatusError, RpcFailure};
    pub use crate::handler::{DefaultErrorHandler, ErrorHandler, RequestInfo, logging};
    pub use crate::layer::{ErrorHandlingLayer, PropagateHeadersLayer};
    pub use crate::metadata::{CUSTOM_HEADER_ID, CallMetadata, HeaderAllowList};
}
