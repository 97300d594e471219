//! RPC status codes and their HTTP translation.
//!
//! [`translate`] is the single table mapping a [`Code`] to the HTTP status
//! reported to clients. It is total over the enumeration; raw numeric codes
//! outside the enumeration go through [`translate_raw`] and land on 500.

use axum::http::StatusCode;

/// gRPC status codes, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Every code, in wire order.
    pub const ALL: [Code; 17] = [
        Code::Ok,
        Code::Canceled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Look up a code by its wire value.
    pub fn from_i32(value: i32) -> Option<Code> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Code::ALL.get(idx).copied())
    }

    /// The name reported in the `error` field of the JSON error body.
    pub fn name(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Canceled => "Canceled",
            Code::Unknown => "Unknown",
            Code::InvalidArgument => "InvalidArgument",
            Code::DeadlineExceeded => "DeadlineExceeded",
            Code::NotFound => "NotFound",
            Code::AlreadyExists => "AlreadyExists",
            Code::PermissionDenied => "PermissionDenied",
            Code::ResourceExhausted => "ResourceExhausted",
            Code::FailedPrecondition => "FailedPrecondition",
            Code::Aborted => "Aborted",
            Code::OutOfRange => "OutOfRange",
            Code::Unimplemented => "Unimplemented",
            Code::Internal => "Internal",
            Code::Unavailable => "Unavailable",
            Code::DataLoss => "DataLoss",
            Code::Unauthenticated => "Unauthenticated",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<tonic::Code> for Code {
    fn from(code: tonic::Code) -> Self {
        match code {
            tonic::Code::Ok => Code::Ok,
            tonic::Code::Cancelled => Code::Canceled,
            tonic::Code::Unknown => Code::Unknown,
            tonic::Code::InvalidArgument => Code::InvalidArgument,
            tonic::Code::DeadlineExceeded => Code::DeadlineExceeded,
            tonic::Code::NotFound => Code::NotFound,
            tonic::Code::AlreadyExists => Code::AlreadyExists,
            tonic::Code::PermissionDenied => Code::PermissionDenied,
            tonic::Code::ResourceExhausted => Code::ResourceExhausted,
            tonic::Code::FailedPrecondition => Code::FailedPrecondition,
            tonic::Code::Aborted => Code::Aborted,
            tonic::Code::OutOfRange => Code::OutOfRange,
            tonic::Code::Unimplemented => Code::Unimplemented,
            tonic::Code::Internal => Code::Internal,
            tonic::Code::Unavailable => Code::Unavailable,
            tonic::Code::DataLoss => Code::DataLoss,
            tonic::Code::Unauthenticated => Code::Unauthenticated,
        }
    }
}

/// Result of translating a status code for HTTP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusTranslation {
    /// HTTP status sent to the client.
    pub http: StatusCode,
    /// Message used when the status carries none, or always when
    /// `replaces_message` is set.
    pub message: &'static str,
    /// Whether `message` hides the handler's own message.
    pub replaces_message: bool,
}

impl StatusTranslation {
    const fn passthrough(http: StatusCode, message: &'static str) -> Self {
        Self {
            http,
            message,
            replaces_message: false,
        }
    }

    const fn normalized(http: StatusCode, message: &'static str) -> Self {
        Self {
            http,
            message,
            replaces_message: true,
        }
    }

    /// Pick the client-facing message given the status' own message.
    pub fn message_for<'a>(&self, raw: &'a str) -> &'a str {
        if self.replaces_message || raw.is_empty() {
            self.message
        } else {
            raw
        }
    }
}

/// Map a status code to its HTTP status and default message.
pub const fn translate(code: Code) -> StatusTranslation {
    match code {
        Code::Ok => StatusTranslation::passthrough(StatusCode::OK, "OK"),
        Code::Canceled => {
            StatusTranslation::passthrough(StatusCode::REQUEST_TIMEOUT, "Request cancelled")
        }
        Code::Unknown => {
            StatusTranslation::passthrough(StatusCode::INTERNAL_SERVER_ERROR, "Unknown error")
        }
        Code::InvalidArgument => {
            StatusTranslation::normalized(StatusCode::BAD_REQUEST, "Invalid request parameters")
        }
        Code::DeadlineExceeded => {
            StatusTranslation::passthrough(StatusCode::GATEWAY_TIMEOUT, "Deadline exceeded")
        }
        Code::NotFound => StatusTranslation::normalized(StatusCode::NOT_FOUND, "Resource not found"),
        Code::AlreadyExists => {
            StatusTranslation::passthrough(StatusCode::CONFLICT, "Resource already exists")
        }
        Code::PermissionDenied => StatusTranslation::normalized(StatusCode::FORBIDDEN, "Access denied"),
        Code::Unauthenticated => {
            StatusTranslation::normalized(StatusCode::UNAUTHORIZED, "Authentication required")
        }
        Code::ResourceExhausted => {
            StatusTranslation::passthrough(StatusCode::TOO_MANY_REQUESTS, "Resource exhausted")
        }
        Code::FailedPrecondition => {
            StatusTranslation::passthrough(StatusCode::PRECONDITION_FAILED, "Precondition failed")
        }
        Code::Aborted => StatusTranslation::passthrough(StatusCode::CONFLICT, "Operation aborted"),
        Code::OutOfRange => StatusTranslation::passthrough(StatusCode::BAD_REQUEST, "Out of range"),
        Code::Unimplemented => {
            StatusTranslation::passthrough(StatusCode::NOT_IMPLEMENTED, "Not implemented")
        }
        Code::Internal => {
            StatusTranslation::passthrough(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
        Code::Unavailable => {
            StatusTranslation::passthrough(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
        }
        Code::DataLoss => StatusTranslation::passthrough(StatusCode::INTERNAL_SERVER_ERROR, "Data loss"),
    }
}

/// Translate a raw wire code. Values outside the enumeration map to 500.
pub fn translate_raw(value: i32) -> StatusTranslation {
    match Code::from_i32(value) {
        Some(code) => translate(code),
        None => StatusTranslation::passthrough(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unknown status code",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        let test_cases = [
            (Code::Ok, StatusCode::OK),
            (Code::Canceled, StatusCode::REQUEST_TIMEOUT),
            (Code::Unknown, StatusCode::INTERNAL_SERVER_ERROR),
            (Code::InvalidArgument, StatusCode::BAD_REQUEST),
            (Code::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
            (Code::NotFound, StatusCode::NOT_FOUND),
            (Code::AlreadyExists, StatusCode::CONFLICT),
            (Code::PermissionDenied, StatusCode::FORBIDDEN),
            (Code::ResourceExhausted, StatusCode::TOO_MANY_REQUESTS),
            (Code::FailedPrecondition, StatusCode::PRECONDITION_FAILED),
            (Code::Aborted, StatusCode::CONFLICT),
            (Code::OutOfRange, StatusCode::BAD_REQUEST),
            (Code::Unimplemented, StatusCode::NOT_IMPLEMENTED),
            (Code::Internal, StatusCode::INTERNAL_SERVER_ERROR),
            (Code::Unavailable, StatusCode::SERVICE_UNAVAILABLE),
            (Code::DataLoss, StatusCode::INTERNAL_SERVER_ERROR),
            (Code::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];

        for (code, expected_status) in test_cases {
            assert_eq!(
                translate(code).http,
                expected_status,
                "Code::{:?} should map to {:?}",
                code,
                expected_status
            );
        }
    }

    #[test]
    fn test_translate_is_deterministic() {
        for code in Code::ALL {
            assert_eq!(translate(code), translate(code));
        }
    }

    #[test]
    fn test_normalized_messages() {
        assert_eq!(
            translate(Code::InvalidArgument).message_for("id is required"),
            "Invalid request parameters"
        );
        assert_eq!(
            translate(Code::NotFound).message_for("resource with id 'x' not found"),
            "Resource not found"
        );
        assert_eq!(
            translate(Code::PermissionDenied).message_for("nope"),
            "Access denied"
        );
        assert_eq!(
            translate(Code::Unauthenticated).message_for("invalid authentication token"),
            "Authentication required"
        );
    }

    #[test]
    fn test_raw_message_kept_for_other_codes() {
        assert_eq!(
            translate(Code::AlreadyExists).message_for("resource with id 'duplicate' already exists"),
            "resource with id 'duplicate' already exists"
        );
        // Empty messages fall back to the default.
        assert_eq!(
            translate(Code::ResourceExhausted).message_for(""),
            "Resource exhausted"
        );
    }

    #[test]
    fn test_from_i32_round_trips_wire_values() {
        for code in Code::ALL {
            assert_eq!(Code::from_i32(code as i32), Some(code));
        }
        assert_eq!(Code::from_i32(17), None);
        assert_eq!(Code::from_i32(-1), None);
    }

    #[test]
    fn test_translate_raw_unmapped_is_500() {
        assert_eq!(translate_raw(99).http, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(translate_raw(-3).http, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(translate_raw(5).http, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_tonic_code_conversion() {
        assert_eq!(Code::from(tonic::Code::Cancelled), Code::Canceled);
        assert_eq!(Code::from(tonic::Code::NotFound), Code::NotFound);
        assert_eq!(Code::from(tonic::Code::Unauthenticated), Code::Unauthenticated);
        // Wire values agree between the two enums.
        for code in Code::ALL {
            assert_eq!(Code::from(tonic::Code::from_i32(code as i32)), code);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Code::NotFound.name(), "NotFound");
        assert_eq!(Code::AlreadyExists.to_string(), "AlreadyExists");
        assert_eq!(Code::Ok.name(), "OK");
    }
}
