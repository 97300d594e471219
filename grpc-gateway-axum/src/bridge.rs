//! Binding HTTP requests to RPC calls.
//!
//! Bridge handlers take the path, query and body apart with ordinary axum
//! extractors, fetch the propagated [`CallMetadata`], and hand a
//! `tonic::Request` to the RPC method. Anything that goes wrong while binding
//! is an [`HttpStatusError`] with status 400, so it is reported verbatim
//! rather than as an RPC status.
//!
//! ```rust,ignore
//! async fn get_param_in_header(
//!     State(svc): State<Arc<Svc>>,
//!     md: CallMetadata,
//!     Query(q): Query<ContentQuery>,
//! ) -> Result<Json<Response>, RpcFailure> {
//!     let id = required_metadata(&md, CUSTOM_HEADER_ID)?.to_owned();
//!     let request = md.into_request(GetParamInHeaderRequest { id, content: q.content });
//!     Ok(reply(svc.get_param_in_header(request).await?))
//! }
//! ```

use axum::Json;
use axum::extract::{FromRequest, Request};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{HttpStatusError, RpcFailure};
use crate::metadata::CallMetadata;

/// JSON request body for an RPC message.
///
/// An empty body binds to `T::default()`, like an omitted protobuf message.
/// The content type is not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = RpcFailure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| HttpStatusError::new(rejection.status(), rejection.body_text()))?;

        decode_json(&bytes).map(JsonBody).map_err(RpcFailure::from)
    }
}

/// Decode a JSON message, treating an empty or all-whitespace body as `T::default()`.
pub fn decode_json<T>(bytes: &[u8]) -> Result<T, HttpStatusError>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| HttpStatusError::bad_request(format!("invalid JSON body: {e}")))
}

/// Value of a propagated header the operation cannot run without.
pub fn required_metadata<'a>(md: &'a CallMetadata, key: &str) -> Result<&'a str, HttpStatusError> {
    md.get(key)
        .ok_or_else(|| HttpStatusError::bad_request(format!("{key} header is required")))
}

/// Unwrap an RPC response into a JSON reply.
pub fn reply<T>(response: tonic::Response<T>) -> Json<T> {
    Json(response.into_inner())
}
