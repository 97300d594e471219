//! Header propagation layer.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::metadata::HeaderAllowList;

/// Layer that attaches [`CallMetadata`](crate::metadata::CallMetadata) to
/// every request before it reaches the handler.
#[derive(Clone, Debug)]
pub struct PropagateHeadersLayer {
    allow: Arc<HeaderAllowList>,
}

impl Default for PropagateHeadersLayer {
    fn default() -> Self {
        Self::new(HeaderAllowList::default())
    }
}

impl PropagateHeadersLayer {
    pub fn new(allow: impl Into<Arc<HeaderAllowList>>) -> Self {
        Self {
            allow: allow.into(),
        }
    }
}

impl<S> Layer<S> for PropagateHeadersLayer {
    type Service = PropagateHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagateHeadersService {
            inner,
            allow: self.allow.clone(),
        }
    }
}

/// Service built by [`PropagateHeadersLayer`].
#[derive(Clone, Debug)]
pub struct PropagateHeadersService<S> {
    inner: S,
    allow: Arc<HeaderAllowList>,
}

impl<S, B> Service<Request<B>> for PropagateHeadersService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let metadata = self.allow.propagate(request.headers());
        request.extensions_mut().insert(metadata);
        self.inner.call(request)
    }
}
