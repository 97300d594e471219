//! Gateway configuration.

use std::sync::Arc;

use axum::Router;

use crate::handler::{DefaultErrorHandler, ErrorHandler, logging};
use crate::layer::{ErrorHandlingLayer, PropagateHeadersLayer};
use crate::metadata::HeaderAllowList;

/// Settings for the gateway middleware.
///
/// Built once at startup; the layers it produces share immutable copies.
/// [`apply`](Self::apply) and [`error_layer`](Self::error_layer) install the
/// process-wide panic capture hook, see [`ErrorHandlingLayer`].
///
/// ```rust,ignore
/// let app = GatewayConfig::default()
///     .with_headers(["x-custom-header-id", "authorization"])
///     .with_stack_trace(false)
///     .apply(routes());
/// ```
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    headers: HeaderAllowList,
    include_stack_trace: bool,
    log_errors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            headers: HeaderAllowList::default(),
            include_stack_trace: true,
            log_errors: true,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the header allow-list.
    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.headers = HeaderAllowList::new(names);
        self
    }

    /// Include `details.stack_trace` in panic responses.
    pub fn with_stack_trace(mut self, include: bool) -> Self {
        self.include_stack_trace = include;
        self
    }

    /// Log every classified failure and tag it with the request id.
    pub fn with_log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    pub fn headers(&self) -> &HeaderAllowList {
        &self.headers
    }

    pub fn include_stack_trace(&self) -> bool {
        self.include_stack_trace
    }

    pub fn log_errors(&self) -> bool {
        self.log_errors
    }

    /// The error handler these settings describe.
    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        let handler = DefaultErrorHandler::new().with_stack_trace(self.include_stack_trace);
        if self.log_errors {
            Arc::new(logging(handler))
        } else {
            Arc::new(handler)
        }
    }

    pub fn error_layer(&self) -> ErrorHandlingLayer {
        ErrorHandlingLayer::from_shared(self.error_handler())
    }

    pub fn propagate_layer(&self) -> PropagateHeadersLayer {
        PropagateHeadersLayer::new(self.headers.clone())
    }

    /// Wrap `router` with header propagation and error handling.
    ///
    /// Routes and the fallback added before this call are covered.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(self.error_layer())
            .layer(self.propagate_layer())
    }
}
