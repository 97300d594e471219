//! Failure values and the structured error record.
//!
//! Handlers surface failures as ordinary Rust errors: a [`tonic::Status`] for
//! business failures, an [`HttpStatusError`] when the HTTP binding itself
//! rejects the request, a [`PanicError`] for recovered panics. The
//! [`ErrorHandler`](crate::handler::ErrorHandler) turns any of them into an
//! [`ErrorRecord`].

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::BoxError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::handler::{DefaultErrorHandler, ErrorHandler, RequestInfo};

/// Detail key for the request path.
pub const DETAIL_REQUEST_PATH: &str = "request_path";
/// Detail key for the request method.
pub const DETAIL_METHOD: &str = "method";
/// Detail key for the `X-Request-ID` value.
pub const DETAIL_REQUEST_ID: &str = "request_id";
/// Detail key for the panic message.
pub const DETAIL_PANIC_MSG: &str = "panic_msg";
/// Detail key for the captured stack trace.
pub const DETAIL_STACK_TRACE: &str = "stack_trace";

/// Which classification produced an [`ErrorRecord`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A `tonic::Status` returned by the RPC handler.
    RpcStatus,
    /// An error that carries its own HTTP status.
    TransportStatus,
    /// A panic caught by the interceptor.
    Panic,
    /// Anything else.
    #[default]
    Unclassified,
}

/// The client-facing description of one failed request.
///
/// Serializes to `{"error", "code", "message", "details"?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(skip)]
    pub category: ErrorCategory,
    #[serde(rename = "error")]
    pub title: String,
    #[serde(rename = "code")]
    pub http_code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl ErrorRecord {
    /// Create a record with empty details.
    pub fn new<T, M>(category: ErrorCategory, http_code: StatusCode, title: T, message: M) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Self {
            category,
            title: title.into(),
            http_code: http_code.as_u16(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Add a detail entry.
    pub fn with_detail<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Get a detail value.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

/// An error that dictates its own HTTP status.
///
/// Produced by the HTTP binding (malformed body, missing required header)
/// before the RPC handler runs. The status is reported verbatim and the
/// message comes from the wrapped error.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct HttpStatusError {
    status: StatusCode,
    source: BoxError,
}

impl HttpStatusError {
    pub fn new<E: Into<BoxError>>(status: StatusCode, source: E) -> Self {
        Self {
            status,
            source: source.into(),
        }
    }

    /// Shorthand for a 400 binding error.
    pub fn bad_request<E: Into<BoxError>>(source: E) -> Self {
        Self::new(StatusCode::BAD_REQUEST, source)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// A panic caught while serving a request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PanicError {
    message: String,
    stack_trace: String,
}

impl PanicError {
    pub fn new<M: Into<String>, T: Into<String>>(message: M, stack_trace: T) -> Self {
        Self {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// `Panic: <payload>` formatted message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }
}

/// Error returned from HTTP bridge handlers.
///
/// Wraps whatever the dispatch surfaced. As a response it renders with the
/// default classification and carries the original failure in its
/// extensions, so [`ErrorHandlingLayer`](crate::layer::ErrorHandlingLayer)
/// can re-classify it with the request context and the configured handler.
#[derive(Debug, Clone)]
pub struct RpcFailure(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl RpcFailure {
    /// The wrapped failure.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl<E> From<E> for RpcFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self(Arc::new(err))
    }
}

/// Response extension marking a failure the interceptor has not yet rendered.
#[derive(Debug, Clone)]
pub(crate) struct PendingFailure(pub(crate) RpcFailure);

impl IntoResponse for RpcFailure {
    fn into_response(self) -> Response {
        let record = DefaultErrorHandler::new().handle_error(self.error(), &RequestInfo::default());
        let mut response = crate::response::error_response(&record);
        response.extensions_mut().insert(PendingFailure(self));
        response
    }
}
