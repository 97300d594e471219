//! Propagating inbound HTTP headers into call metadata.
//!
//! Only headers on the [`HeaderAllowList`] are copied. Names are matched
//! case-insensitively and stored lower-cased; empty values are skipped.
//! [`PropagateHeadersLayer`](crate::layer::PropagateHeadersLayer) does this
//! once per request and stores the resulting [`CallMetadata`] in the request
//! extensions, where bridge handlers pick it up with the [`CallMetadata`]
//! extractor and hand it to the RPC method as `tonic` metadata.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use tonic::metadata::{Ascii, AsciiMetadataValue, MetadataKey, MetadataMap};

/// Header carrying the identifier for the header-parameter operation.
pub const CUSTOM_HEADER_ID: &str = "x-custom-header-id";

/// Immutable set of header names forwarded into call metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderAllowList {
    names: Vec<String>,
}

impl Default for HeaderAllowList {
    /// `x-custom-header-id`, `authorization`, `content-type`.
    fn default() -> Self {
        Self::new([CUSTOM_HEADER_ID, "authorization", "content-type"])
    }
}

impl HeaderAllowList {
    /// Build from header names. Names are lower-cased, duplicates dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_ascii_lowercase();
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    /// Metadata key for `header`, if it is allowed.
    pub fn matches(&self, header: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(header))
            .map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Copy allowed, present, non-empty headers into fresh [`CallMetadata`].
    ///
    /// For repeated headers the first non-empty value wins. Values are decoded
    /// as UTF-8; bytes that are not valid UTF-8 are skipped.
    pub fn propagate(&self, headers: &HeaderMap) -> CallMetadata {
        let mut entries = BTreeMap::new();

        for name in &self.names {
            let value = headers
                .get_all(name.as_str())
                .iter()
                .filter_map(|v| std::str::from_utf8(v.as_bytes()).ok())
                .find(|v| !v.is_empty());

            if let Some(value) = value {
                tracing::debug!(header = %name, "propagating header into call metadata");
                entries.insert(name.clone(), value.to_owned());
            }
        }

        CallMetadata { entries }
    }
}

/// Per-request metadata derived from allow-listed headers.
///
/// Read-only once built. Extracting it in a handler never fails: without the
/// propagation layer it is simply empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallMetadata {
    entries: BTreeMap<String, String>,
}

impl CallMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert into `tonic` metadata. Entries `tonic` rejects are dropped.
    pub fn to_metadata_map(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        for (key, value) in &self.entries {
            let Ok(key) = MetadataKey::<Ascii>::from_bytes(key.as_bytes()) else {
                tracing::debug!(key = %key, "invalid metadata key, dropped");
                continue;
            };
            match AsciiMetadataValue::try_from(value.as_bytes()) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(e) => {
                    tracing::debug!(key = key.as_str(), error = %e, "invalid metadata value, dropped");
                }
            }
        }
        map
    }

    /// Wrap `message` in a `tonic::Request` carrying this metadata.
    pub fn into_request<T>(self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = self.to_metadata_map();
        request
    }
}

impl<S> FromRequestParts<S> for CallMetadata
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallMetadata>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_default_allow_list() {
        let allow = HeaderAllowList::default();
        let names: Vec<_> = allow.names().collect();
        assert_eq!(names, ["x-custom-header-id", "authorization", "content-type"]);
    }

    #[test]
    fn test_allow_list_normalizes_names() {
        let allow = HeaderAllowList::new(["X-Custom-Header-Id", "x-custom-header-id", " ", "Authorization"]);
        let names: Vec<_> = allow.names().collect();
        assert_eq!(names, ["x-custom-header-id", "authorization"]);
        assert_eq!(allow.matches("AUTHORIZATION"), Some("authorization"));
        assert_eq!(allow.matches("x-other"), None);
    }

    #[test]
    fn test_propagate_only_allowed_headers() {
        let allow = HeaderAllowList::default();
        let md = allow.propagate(&headers(&[
            ("X-Custom-Header-Id", "abc"),
            ("Authorization", "Bearer t"),
            ("X-Request-ID", "req-1"),
            ("Cookie", "secret"),
        ]));

        assert_eq!(md.len(), 2);
        assert_eq!(md.get("x-custom-header-id"), Some("abc"));
        assert_eq!(md.get("authorization"), Some("Bearer t"));
        assert_eq!(md.get("x-request-id"), None);
        assert_eq!(md.get("cookie"), None);
        for (key, _) in md.iter() {
            assert!(allow.matches(key).is_some());
            assert_eq!(key, key.to_ascii_lowercase());
        }
    }

    #[test]
    fn test_propagate_skips_empty_values() {
        let allow = HeaderAllowList::default();
        let md = allow.propagate(&headers(&[("x-custom-header-id", ""), ("content-type", "application/json")]));

        assert_eq!(md.get("x-custom-header-id"), None);
        assert_eq!(md.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_propagate_first_non_empty_repeated_value() {
        let allow = HeaderAllowList::default();
        let md = allow.propagate(&headers(&[
            ("x-custom-header-id", ""),
            ("x-custom-header-id", "second"),
            ("x-custom-header-id", "third"),
        ]));
        assert_eq!(md.get("x-custom-header-id"), Some("second"));
    }

    #[test]
    fn test_propagate_does_not_touch_headers() {
        let allow = HeaderAllowList::default();
        let original = headers(&[("X-Custom-Header-Id", "abc"), ("Cookie", "c")]);
        let copy = original.clone();
        let _ = allow.propagate(&original);
        assert_eq!(original, copy);
    }

    #[test]
    fn test_propagate_with_empty_allow_list() {
        let allow = HeaderAllowList::new(Vec::<String>::new());
        let md = allow.propagate(&headers(&[("authorization", "x")]));
        assert!(md.is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let md = HeaderAllowList::default().propagate(&headers(&[("x-custom-header-id", "abc")]));
        assert_eq!(md.get("X-Custom-Header-Id"), Some("abc"));
    }

    #[test]
    fn test_into_request_carries_metadata() {
        let md = HeaderAllowList::default().propagate(&headers(&[
            ("x-custom-header-id", "abc"),
            ("authorization", "Bearer t"),
        ]));
        let request = md.into_request(());

        assert_eq!(
            request.metadata().get("x-custom-header-id").unwrap().to_str().unwrap(),
            "abc"
        );
        assert_eq!(
            request.metadata().get("authorization").unwrap().to_str().unwrap(),
            "Bearer t"
        );
    }

    #[test]
    fn test_propagate_keeps_utf8_values() {
        let mut map = HeaderMap::new();
        map.insert(
            "x-custom-header-id",
            HeaderValue::from_bytes("café".as_bytes()).unwrap(),
        );
        map.insert("authorization", HeaderValue::from_bytes(b"\xff\xfe").unwrap());

        let md = HeaderAllowList::default().propagate(&map);
        assert_eq!(md.get("x-custom-header-id"), Some("café"));
        assert_eq!(md.get("authorization"), None);

        let request = md.into_request(());
        let value = request.metadata().get("x-custom-header-id").unwrap();
        assert_eq!(value.as_encoded_bytes(), "café".as_bytes());
    }

    #[tokio::test]
    async fn test_extractor_defaults_to_empty() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let md = CallMetadata::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(md.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_reads_extension() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let md = HeaderAllowList::default().propagate(&headers(&[("authorization", "x")]));
        parts.extensions.insert(md.clone());

        let extracted = CallMetadata::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, md);
    }
}
