//! Error handling and panic recovery layer.
//!
//! Every response passes through here:
//!
//! - a response produced from an [`RpcFailure`] is re-classified with the
//!   request context and the configured [`ErrorHandler`], replacing the
//!   placeholder rendering;
//! - a panic in the handler future, before any status was committed, becomes
//!   a `Panic Error` response;
//! - once a status is committed the body is wrapped in [`InterceptedBody`],
//!   which can only abort the stream if the producer panics later;
//! - everything else passes through.
//!
//! If the client goes away the future is dropped and nothing is written.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::FutureExt;
use tower::{Layer, Service, ServiceExt};

use crate::error::{PanicError, PendingFailure, RpcFailure};
use crate::handler::{DefaultErrorHandler, ErrorHandler, RequestInfo};
use crate::intercept::{InterceptedBody, InterceptedResponse};
use crate::panic::install_capture_hook;
use crate::response::error_response;

/// Layer that renders failures and recovers from panics.
///
/// Building one installs a process-wide panic hook (see
/// [`install_capture_hook`](crate::panic::install_capture_hook)). The hook
/// chains to the previous one and captures a backtrace on every panic in the
/// process, not only in requests served by this layer.
#[derive(Clone)]
pub struct ErrorHandlingLayer {
    handler: Arc<dyn ErrorHandler>,
}

impl Default for ErrorHandlingLayer {
    fn default() -> Self {
        Self::new(DefaultErrorHandler::new())
    }
}

impl std::fmt::Debug for ErrorHandlingLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandlingLayer").finish_non_exhaustive()
    }
}

impl ErrorHandlingLayer {
    /// Create a layer using `handler` for classification.
    ///
    /// Installs the panic capture hook on first use.
    pub fn new<H: ErrorHandler + 'static>(handler: H) -> Self {
        Self::from_shared(Arc::new(handler))
    }

    /// Create a layer from an already shared handler.
    pub fn from_shared(handler: Arc<dyn ErrorHandler>) -> Self {
        install_capture_hook();
        Self { handler }
    }
}

impl<S> Layer<S> for ErrorHandlingLayer {
    type Service = ErrorHandlingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorHandlingService {
            inner,
            handler: self.handler.clone(),
        }
    }
}

/// Service built by [`ErrorHandlingLayer`].
#[derive(Clone)]
pub struct ErrorHandlingService<S> {
    inner: S,
    handler: Arc<dyn ErrorHandler>,
}

impl<S> Service<Request<Body>> for ErrorHandlingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let info = RequestInfo::from_request(&req);
        let handler = self.handler.clone();

        let inner = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, inner);

        Box::pin(async move {
            // `oneshot` runs inside the unwind boundary, so a panic while
            // building the handler future is caught too.
            let outcome = AssertUnwindSafe(async move { inner.oneshot(req).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(response)) => {
                    let response = render_pending(response, &info, handler.as_ref());
                    Ok(commit(response, info))
                }
                Ok(Err(e)) => Err(e),
                Err(payload) => {
                    // Nothing was committed yet: the handler future never
                    // produced a response.
                    let panic = PanicError::from_payload(payload.as_ref());
                    tracing::error!(
                        method = %info.method,
                        path = %info.path,
                        panic_msg = %panic.message(),
                        stack_trace = %panic.stack_trace(),
                        "panic recovered"
                    );
                    let record = handler.handle_error(&panic, &info);
                    Ok(commit(error_response(&record), info))
                }
            }
        })
    }
}

/// Replace a response built from an [`RpcFailure`] with its classified rendering.
fn render_pending(mut response: Response, info: &RequestInfo, handler: &dyn ErrorHandler) -> Response {
    match response.extensions_mut().remove::<PendingFailure>() {
        Some(PendingFailure(failure)) => render_failure(&failure, info, handler),
        None => response,
    }
}

fn render_failure(failure: &RpcFailure, info: &RequestInfo, handler: &dyn ErrorHandler) -> Response {
    let record = handler.handle_error(failure.error(), info);
    error_response(&record)
}

/// Commit the status line and guard the body from here on.
fn commit(response: Response, info: RequestInfo) -> Response {
    let mut state = InterceptedResponse::new();
    state.start(response.status());
    response.map(|body| Body::new(InterceptedBody::new(body, state, info)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpStatusError;
    use crate::handler::logging;
    use crate::intercept::BodyPanicked;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use bytes::Bytes;
    use futures::{StreamExt, stream};
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app(router: Router) -> Router {
        router.layer(ErrorHandlingLayer::default())
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let app = app(Router::new().route("/ok", get(|| async { "fine" })));
        let resp = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"fine");
    }

    #[tokio::test]
    async fn test_status_failure_gets_request_details() {
        async fn fail() -> Result<&'static str, RpcFailure> {
            Err(tonic::Status::not_found("resource with id 'x' not found").into())
        }
        let app = app(Router::new().route("/v1/items/{id}", get(fail)));
        let resp = app
            .oneshot(Request::get("/v1/items/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json = body_json(resp).await;
        assert_eq!(json["error"], "NotFound");
        assert_eq!(json["message"], "Resource not found");
        assert_eq!(json["details"]["request_path"], "/v1/items/x");
        assert_eq!(json["details"]["method"], "GET");
    }

    #[tokio::test]
    async fn test_transport_failure() {
        async fn fail() -> Result<&'static str, RpcFailure> {
            Err(HttpStatusError::bad_request("malformed body").into())
        }
        let app = app(Router::new().route("/bind", get(fail)));
        let resp = app
            .oneshot(Request::get("/bind").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "HTTP Status Error");
        assert_eq!(json["message"], "malformed body");
    }

    #[tokio::test]
    async fn test_panic_before_response() {
        async fn boom() -> &'static str {
            panic!("index 2 out of range")
        }
        let app = app(Router::new().route("/boom", get(boom)));
        let resp = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Panic Error");
        assert_eq!(json["code"], 500);
        assert_eq!(json["message"], "A panic occurred while processing the request");
        assert_eq!(json["details"]["panic_msg"], "Panic: index 2 out of range");
        assert!(!json["details"]["stack_trace"].as_str().unwrap().is_empty());
        assert_eq!(json["details"]["request_path"], "/boom");
    }

    #[tokio::test]
    async fn test_panic_without_stack_trace() {
        async fn nope() -> &'static str {
            panic!("nope")
        }
        let layer = ErrorHandlingLayer::new(DefaultErrorHandler::new().with_stack_trace(false));
        let app = Router::new()
            .route("/boom", get(nope))
            .layer(layer);
        let resp = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["details"]["panic_msg"], "Panic: nope");
        assert!(json["details"].get("stack_trace").is_none());
    }

    #[tokio::test]
    async fn test_panic_after_response_started() {
        async fn half_written() -> Response {
            let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"{\"partial\":"))])
                .chain(stream::poll_fn(|_| -> Poll<Option<Result<Bytes, std::io::Error>>> {
                    panic!("serializer blew up")
                }));
            (StatusCode::OK, Body::from_stream(chunks)).into_response()
        }
        let app = app(Router::new().route("/stream", get(half_written)));
        let resp = app
            .oneshot(Request::get("/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // The committed status is kept.
        assert_eq!(resp.status(), StatusCode::OK);

        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"{\"partial\":"));

        let err = body.frame().await.unwrap().unwrap_err();
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        let mut found = false;
        while let Some(e) = source {
            if e.downcast_ref::<BodyPanicked>().is_some() {
                found = true;
                break;
            }
            source = e.source();
        }
        assert!(found, "body should end with BodyPanicked, got {err}");
    }

    #[tokio::test]
    async fn test_custom_handler_is_used() {
        let layer = ErrorHandlingLayer::new(logging(DefaultErrorHandler::new()));
        async fn fail() -> Result<&'static str, RpcFailure> {
            Err(tonic::Status::resource_exhausted("rate limit exceeded").into())
        }
        let app = Router::new().route("/limited", get(fail)).layer(layer);
        let resp = app
            .oneshot(
                Request::get("/limited")
                    .header("X-Request-ID", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = body_json(resp).await;
        assert_eq!(json["message"], "rate limit exceeded");
        assert_eq!(json["details"]["request_id"], "req-42");
    }

    #[tokio::test]
    async fn test_render_pending_uses_request_context() {
        let info = RequestInfo {
            path: "/v1/items/7".to_string(),
            ..RequestInfo::default()
        };
        let tagged = RpcFailure::from(tonic::Status::not_found("gone")).into_response();
        let resp = render_pending(tagged, &info, &DefaultErrorHandler::new());

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.extensions().get::<PendingFailure>().is_none());
        let json = body_json(resp).await;
        assert_eq!(json["details"]["request_path"], "/v1/items/7");

        let plain = render_pending("ok".into_response(), &info, &DefaultErrorHandler::new());
        assert_eq!(plain.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_commit_keeps_status_and_body() {
        let resp = commit(
            (StatusCode::CREATED, "made").into_response(),
            RequestInfo::default(),
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"made");
    }
}
