//! Precognition wire headers
//!
//! | Request header        | Meaning                                   |
//! |-----------------------|-------------------------------------------|
//! | `Precognitive: true`  | Speculative validation probe              |
//! | `Precognitive-Keys`   | Comma-separated paths to validate         |
//!
//! Responses echo `Precognitive`, report `Precognitive-success` and echo
//! the requested subset in `Precognitive-keys`. Header names are case
//! insensitive on the wire.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const PRECOGNITIVE: HeaderName = HeaderName::from_static("precognitive");
pub const PRECOGNITIVE_KEYS: HeaderName = HeaderName::from_static("precognitive-keys");
pub const PRECOGNITIVE_SUCCESS: HeaderName = HeaderName::from_static("precognitive-success");

pub(crate) const TRUE: HeaderValue = HeaderValue::from_static("true");
pub(crate) const FALSE: HeaderValue = HeaderValue::from_static("false");
pub(crate) const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Whether the request is a precognitive probe
pub fn is_precognitive(headers: &HeaderMap) -> bool {
    headers
        .get(PRECOGNITIVE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// Raw `Precognitive-Keys` value, when present and non-empty
pub fn precognitive_keys_header(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers
        .get(PRECOGNITIVE_KEYS)
        .filter(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
}

/// Requested field paths, split on commas
pub fn precognitive_keys(headers: &HeaderMap) -> Option<Vec<String>> {
    let raw = precognitive_keys_header(headers)?.to_str().ok()?;
    let keys: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    (!keys.is_empty()).then_some(keys)
}
