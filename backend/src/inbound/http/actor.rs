//! Actor attribution for audited admin operations.
//!
//! The upstream authentication layer forwards the operator identity in the
//! `x-actor-id` header. Requests without it are attributed to `system`.

use actix_web::http::header::HeaderMap;

/// Header carrying the authenticated operator.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Fallback actor when no operator is identified.
pub const DEFAULT_ACTOR: &str = "system";

/// Read the actor from request headers.
///
/// # Examples
/// ```
/// use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
/// use registrar::inbound::http::actor::actor_from_headers;
///
/// let mut headers = HeaderMap::new();
/// assert_eq!(actor_from_headers(&headers), "system");
/// headers.insert(HeaderName::from_static("x-actor-id"), HeaderValue::from_static("ops-7"));
/// assert_eq!(actor_from_headers(&headers), "ops-7");
/// ```
#[must_use]
pub fn actor_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_owned()
}
