//! Error classification.
//!
//! An [`ErrorHandler`] turns any failure surfaced while serving a request into
//! an [`ErrorRecord`]. [`DefaultErrorHandler`] implements the classification
//! rules; [`logging`] decorates another handler with logging and request-id
//! enrichment. Closures with the right signature are handlers too, so extra
//! behavior composes by wrapping rather than by subtyping:
//!
//! ```ignore
//! use grpc_gateway_axum::handler::{logging, DefaultErrorHandler, ErrorHandler};
//!
//! let handler = logging(DefaultErrorHandler::new());
//! let tagged = move |err: &(dyn std::error::Error + 'static), req: &RequestInfo| {
//!     handler.handle_error(err, req).with_detail("region", "eu-west-1")
//! };
//! ```

use std::error::Error;

use axum::http::{Method, Request, StatusCode, request::Parts};

use crate::error::{
    DETAIL_METHOD, DETAIL_PANIC_MSG, DETAIL_REQUEST_ID, DETAIL_REQUEST_PATH, DETAIL_STACK_TRACE,
    ErrorCategory, ErrorRecord, HttpStatusError, PanicError,
};
use crate::status::{Code, translate};

/// Header carrying the caller's request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The parts of the request that end up in error details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub request_id: Option<String>,
}

impl Default for RequestInfo {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            request_id: None,
        }
    }
}

impl RequestInfo {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::from_components(req.method(), req.uri().path(), req.headers())
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_components(&parts.method, parts.uri.path(), &parts.headers)
    }

    fn from_components(method: &Method, path: &str, headers: &axum::http::HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        Self {
            method: method.clone(),
            path: path.to_owned(),
            request_id,
        }
    }
}

/// Turns a failure into the record sent to the client.
///
/// Implementations run on the failure path and must not panic.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, err: &(dyn Error + 'static), req: &RequestInfo) -> ErrorRecord;
}

impl<F> ErrorHandler for F
where
    F: Fn(&(dyn Error + 'static), &RequestInfo) -> ErrorRecord + Send + Sync,
{
    fn handle_error(&self, err: &(dyn Error + 'static), req: &RequestInfo) -> ErrorRecord {
        self(err, req)
    }
}

/// The standard classification.
///
/// Tries, in order, an RPC status, an [`HttpStatusError`], a [`PanicError`].
/// Each is searched for along the whole source chain, so wrapping a status in
/// another error does not change how it is reported. Anything else becomes a
/// generic 500.
#[derive(Clone, Copy, Debug)]
pub struct DefaultErrorHandler {
    include_stack_trace: bool,
}

impl Default for DefaultErrorHandler {
    fn default() -> Self {
        Self {
            include_stack_trace: true,
        }
    }
}

impl DefaultErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether panic records carry `details.stack_trace`.
    pub fn with_stack_trace(mut self, include: bool) -> Self {
        self.include_stack_trace = include;
        self
    }

    fn rpc_status(&self, status: &tonic::Status, req: &RequestInfo) -> ErrorRecord {
        let code = Code::from(status.code());
        let translation = translate(code);

        with_request_details(
            ErrorRecord::new(
                ErrorCategory::RpcStatus,
                translation.http,
                code.name(),
                translation.message_for(status.message()),
            ),
            req,
        )
    }

    fn transport_status(&self, err: &HttpStatusError, req: &RequestInfo) -> ErrorRecord {
        with_request_details(
            ErrorRecord::new(
                ErrorCategory::TransportStatus,
                err.status(),
                "HTTP Status Error",
                err.to_string(),
            ),
            req,
        )
    }

    fn panic(&self, err: &PanicError, req: &RequestInfo) -> ErrorRecord {
        let mut record = with_request_details(
            ErrorRecord::new(
                ErrorCategory::Panic,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Panic Error",
                "A panic occurred while processing the request",
            ),
            req,
        )
        .with_detail(DETAIL_PANIC_MSG, err.message());

        if self.include_stack_trace {
            record = record.with_detail(DETAIL_STACK_TRACE, err.stack_trace());
        }
        record
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle_error(&self, err: &(dyn Error + 'static), req: &RequestInfo) -> ErrorRecord {
        if let Some(status) = find_cause::<tonic::Status>(err) {
            return self.rpc_status(status, req);
        }
        if let Some(http) = find_cause::<HttpStatusError>(err) {
            return self.transport_status(http, req);
        }
        if let Some(panic) = find_cause::<PanicError>(err) {
            return self.panic(panic, req);
        }

        with_request_details(
            ErrorRecord::new(
                ErrorCategory::Unclassified,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "An unexpected error occurred",
            ),
            req,
        )
    }
}

/// Wrap `inner` so every failure is logged and tagged with the request id.
///
/// The log line carries method, path and the failure; when the request had an
/// `X-Request-ID` header its value is added as `details.request_id`.
pub fn logging<H>(inner: H) -> impl ErrorHandler
where
    H: ErrorHandler,
{
    move |err: &(dyn Error + 'static), req: &RequestInfo| {
        tracing::warn!(
            method = %req.method,
            path = %req.path,
            error = %err,
            "error handling request"
        );

        let record = inner.handle_error(err, req);
        match &req.request_id {
            Some(id) => record.with_detail(DETAIL_REQUEST_ID, id.as_str()),
            None => record,
        }
    }
}

fn with_request_details(record: ErrorRecord, req: &RequestInfo) -> ErrorRecord {
    record
        .with_detail(DETAIL_REQUEST_PATH, req.path.as_str())
        .with_detail(DETAIL_METHOD, req.method.as_str())
}

/// Find `T` in `err` or any of its sources.
fn find_cause<'a, T: Error + 'static>(err: &'a (dyn Error + 'static)) -> Option<&'a T> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}
