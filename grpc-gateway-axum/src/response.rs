//! JSON rendering of [`ErrorRecord`]s.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;

use crate::error::ErrorRecord;

/// Body written when an [`ErrorRecord`] cannot be encoded.
pub const FALLBACK_ERROR_BODY: &[u8] =
    br#"{"error":"Internal Server Error","code":500,"message":"Failed to serialize error response"}"#;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Render `record` as an `application/json` response with status `record.http_code`.
///
/// Falls back to [`internal_error_response`] if the record cannot be encoded
/// or its code is not a valid HTTP status.
pub fn error_response(record: &ErrorRecord) -> Response {
    let Ok(status) = StatusCode::from_u16(record.http_code) else {
        tracing::debug!(code = record.http_code, "invalid HTTP status in error record");
        return internal_error_response();
    };

    match serde_json::to_vec(record) {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
            .body(Body::from(body))
            .unwrap_or_else(|_| internal_error_response()),
        Err(e) => {
            tracing::debug!(error = %e, "failed to serialize error response");
            internal_error_response()
        }
    }
}

/// A 500 response with [`FALLBACK_ERROR_BODY`].
///
/// Everything here is static, nothing can fail to encode.
pub fn internal_error_response() -> Response {
    let mut response = Response::new(Body::from(FALLBACK_ERROR_BODY));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}
