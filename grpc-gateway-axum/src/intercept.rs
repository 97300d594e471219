//! Tracking what has already been sent for a request.
//!
//! [`InterceptedResponse`] is the per-request state: whether the status line
//! has gone out and which status it carried. Once started it never goes back,
//! and nothing may write a second status line.
//!
//! [`InterceptedBody`] wraps the response body after the status is committed.
//! A panic while producing body frames is caught there; at that point the
//! response cannot be repaired, so the body ends with an error and the
//! connection is torn down by the server.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::BoxError;
use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project_lite::pin_project;

use crate::error::PanicError;
use crate::handler::RequestInfo;

/// Send state of one response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterceptedResponse {
    started: bool,
    status: Option<StatusCode>,
    panicked_after_start: bool,
}

impl InterceptedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the status line. Returns `false` if a status was already
    /// committed, in which case nothing changes.
    pub fn start(&mut self, status: StatusCode) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.status = Some(status);
        true
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether a panic was caught after the status was committed.
    pub fn panicked_after_start(&self) -> bool {
        self.panicked_after_start
    }

    fn record_panic_after_start(&mut self) {
        self.panicked_after_start = true;
    }
}

/// Error ending a body whose producer panicked mid-stream.
#[derive(Debug, thiserror::Error)]
#[error("response body aborted after status {status}: {panic}")]
pub struct BodyPanicked {
    pub status: StatusCode,
    #[source]
    pub panic: PanicError,
}

pin_project! {
    /// Response body that catches panics from the wrapped body.
    pub struct InterceptedBody {
        #[pin]
        inner: Body,
        state: InterceptedResponse,
        request: RequestInfo,
        done: bool,
    }
}

impl InterceptedBody {
    /// Wrap `inner`. `state` must already be started.
    pub fn new(inner: Body, state: InterceptedResponse, request: RequestInfo) -> Self {
        Self {
            inner,
            state,
            request,
            done: false,
        }
    }

    pub fn state(&self) -> &InterceptedResponse {
        &self.state
    }
}

impl HttpBody for InterceptedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        let mut inner = this.inner;
        match catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll_frame(cx))) {
            Ok(Poll::Ready(Some(frame))) => Poll::Ready(Some(frame.map_err(Into::into))),
            Ok(Poll::Ready(None)) => {
                *this.done = true;
                Poll::Ready(None)
            }
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => {
                let panic = PanicError::from_payload(payload.as_ref());
                this.state.record_panic_after_start();
                *this.done = true;

                let status = this.state.status().unwrap_or(StatusCode::OK);
                tracing::error!(
                    method = %this.request.method,
                    path = %this.request.path,
                    status = %status,
                    panic_msg = %panic.message(),
                    stack_trace = %panic.stack_trace(),
                    "panic recovered after response started; status already sent, aborting body"
                );

                Poll::Ready(Some(Err(Box::new(BodyPanicked { status, panic }))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};
    use http_body_util::BodyExt;

    #[test]
    fn test_start_is_once() {
        let mut state = InterceptedResponse::new();
        assert!(!state.is_started());
        assert_eq!(state.status(), None);

        assert!(state.start(StatusCode::OK));
        assert!(state.is_started());
        assert_eq!(state.status(), Some(StatusCode::OK));

        // A second status line is refused and does not replace the first.
        assert!(!state.start(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(state.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_body_passes_frames_through() {
        let mut state = InterceptedResponse::new();
        state.start(StatusCode::OK);
        let body = InterceptedBody::new(Body::from("hello"), state, RequestInfo::default());

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_body_panic_ends_with_error() {
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"partial"))])
            .chain(stream::poll_fn(|_| -> Poll<Option<Result<Bytes, std::io::Error>>> {
                panic!("writer exploded")
            }));
        let mut state = InterceptedResponse::new();
        state.start(StatusCode::OK);

        let mut body = InterceptedBody::new(
            Body::from_stream(chunks),
            state,
            RequestInfo::default(),
        );

        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"partial"));

        let err = body.frame().await.unwrap().unwrap_err();
        let panicked = err.downcast_ref::<BodyPanicked>().unwrap();
        assert_eq!(panicked.status, StatusCode::OK);
        assert_eq!(panicked.panic.message(), "Panic: writer exploded");

        assert!(body.state().panicked_after_start());
        assert_eq!(body.state().status(), Some(StatusCode::OK));
        assert!(body.frame().await.is_none());
    }
}
