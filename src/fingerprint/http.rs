//! Conditional GET support for handlers serving JSON payloads.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, warn};

use super::{Fingerprint, fingerprint_of, is_valid};

/// Whether the request's `If-None-Match` names the current representation.
///
/// Accepts `*`, comma separated lists and repeated headers. Weak tags are
/// compared by their opaque part, as `If-None-Match` requires.
pub fn if_none_match_matches(headers: &HeaderMap, current: &Fingerprint) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|tag| tag == "*" || opaque_tag(tag).is_some_and(|opaque| is_valid(opaque, current)))
}

fn opaque_tag(tag: &str) -> Option<&str> {
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.strip_prefix('"')?.strip_suffix('"')
}

/// Respond with `304 Not Modified` when the client already holds `payload`,
/// otherwise with `200` and the JSON body. Both carry the strong `ETag`.
pub fn conditional_json<T: Serialize>(headers: &HeaderMap, payload: T) -> Response {
    let current = match fingerprint_of(&payload) {
        Ok(current) => current,
        Err(err) => {
            warn!(op = "conditional_json", error = %err, "payload not fingerprintable, skipping ETag");
            return Json(payload).into_response();
        }
    };

    let etag = HeaderValue::from_str(&current.to_etag())
        .unwrap_or_else(|_| HeaderValue::from_static("\"invalid\""));

    let mut response = if if_none_match_matches(headers, &current) {
        debug!(op = "conditional_json", etag = %current, result = "not_modified");
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(payload).into_response()
    };
    response.headers_mut().insert(header::ETAG, etag);
    response
}
