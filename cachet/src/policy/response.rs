//! Decides whether a backend response may be stored.

use http::header::{CACHE_CONTROL, CONTENT_LENGTH, DATE, ETAG, EXPIRES, LAST_MODIFIED};
use http::{Method, StatusCode};

use cachet_core::directives::has_directive;
use cachet_core::CacheRequest;

use crate::config::CacheConfig;

/// Statuses cacheable without explicit freshness information
/// (RFC 2616 §13.4).
const HEURISTICALLY_CACHEABLE: [StatusCode; 5] = [
    StatusCode::OK,
    StatusCode::NON_AUTHORITATIVE_INFORMATION,
    StatusCode::MULTIPLE_CHOICES,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::GONE,
];

/// Statuses never stored: partial content needs range machinery, and
/// `303 See Other` is explicitly uncacheable in RFC 2616.
const NEVER_CACHEABLE: [StatusCode; 2] = [StatusCode::PARTIAL_CONTENT, StatusCode::SEE_OTHER];

/// Gate behind the backend call.
#[derive(Debug, Clone)]
pub struct ResponsePolicy {
    max_object_size_bytes: u64,
    shared_cache: bool,
}

impl ResponsePolicy {
    /// Derives the policy from the cache configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_object_size_bytes: config.max_object_size_bytes as u64,
            shared_cache: config.shared_cache,
        }
    }

    /// Whether the response to `request` may be stored.
    pub fn is_response_cacheable(
        &self,
        request: &CacheRequest,
        response: &http::response::Parts,
    ) -> bool {
        if request.method() != Method::GET {
            return false;
        }

        let status = response.status;
        if NEVER_CACHEABLE.contains(&status) {
            return false;
        }
        let heuristically_cacheable = HEURISTICALLY_CACHEABLE.contains(&status);
        if !heuristically_cacheable && !Self::known_cacheable_by_default_exception(status) {
            // Unknown or explicitly uncacheable-by-default status codes.
            return false;
        }

        if self.declared_length_exceeds_limit(response) {
            return false;
        }
        if Self::conflicting_headers(response) {
            return false;
        }

        if has_directive(&response.headers, &CACHE_CONTROL, "no-store") {
            return false;
        }
        if self.shared_cache && has_directive(&response.headers, &CACHE_CONTROL, "private") {
            return false;
        }

        let explicit = self.has_explicit_freshness(response);

        // Responses to query URIs require explicit expiration (§13.9).
        if request.uri().query().is_some() && !explicit {
            return false;
        }

        if heuristically_cacheable {
            return true;
        }

        // Remaining statuses are storable only on explicit instruction.
        explicit
    }

    /// Statuses outside the heuristic set that may still be stored when the
    /// origin says so explicitly.
    fn known_cacheable_by_default_exception(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT | StatusCode::NOT_FOUND
        )
    }

    fn declared_length_exceeds_limit(&self, response: &http::response::Parts) -> bool {
        response
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .is_some_and(|length| length > self.max_object_size_bytes)
    }

    /// Multiple disagreeing `Content-Length` or multiple `Date` headers
    /// leave the message ambiguous; refuse to store it.
    fn conflicting_headers(response: &http::response::Parts) -> bool {
        let mut lengths = response
            .headers
            .get_all(CONTENT_LENGTH)
            .iter()
            .filter_map(|v| v.to_str().ok());
        if let Some(first) = lengths.next() {
            if lengths.any(|other| other != first) {
                return true;
            }
        }
        response.headers.get_all(DATE).iter().count() > 1
    }

    /// Whether the response carries freshness information or a validator
    /// making it explicitly storable.
    fn has_explicit_freshness(&self, response: &http::response::Parts) -> bool {
        if response.headers.contains_key(EXPIRES)
            || response.headers.contains_key(ETAG)
            || response.headers.contains_key(LAST_MODIFIED)
        {
            return true;
        }
        if has_directive(&response.headers, &CACHE_CONTROL, "max-age") {
            return true;
        }
        self.shared_cache && has_directive(&response.headers, &CACHE_CONTROL, "s-maxage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn policy() -> ResponsePolicy {
        ResponsePolicy::from_config(&CacheConfig::default())
    }

    fn get(uri: &str) -> CacheRequest {
        http::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn response(status: u16, headers: &[(&str, &str)]) -> http::response::Parts {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn plain_ok_response_is_cacheable() {
        let request = get("http://example.com/a");
        assert!(policy().is_response_cacheable(&request, &response(200, &[])));
    }

    #[test]
    fn non_get_requests_never_store() {
        let request = http::Request::builder()
            .method("POST")
            .uri("http://example.com/a")
            .body(Bytes::new())
            .unwrap();
        assert!(!policy().is_response_cacheable(&request, &response(200, &[])));
    }

    #[test]
    fn partial_content_and_see_other_never_store() {
        let request = get("http://example.com/a");
        assert!(!policy().is_response_cacheable(&request, &response(206, &[])));
        assert!(!policy().is_response_cacheable(&request, &response(303, &[])));
    }

    #[test]
    fn found_needs_explicit_freshness() {
        let request = get("http://example.com/a");
        assert!(!policy().is_response_cacheable(&request, &response(302, &[])));
        assert!(policy().is_response_cacheable(
            &request,
            &response(302, &[("cache-control", "max-age=300")])
        ));
    }

    #[test]
    fn no_store_and_shared_private_refused() {
        let request = get("http://example.com/a");
        assert!(!policy().is_response_cacheable(
            &request,
            &response(200, &[("cache-control", "no-store")])
        ));
        assert!(!policy().is_response_cacheable(
            &request,
            &response(200, &[("cache-control", "private")])
        ));

        let private_cache =
            ResponsePolicy::from_config(&CacheConfig::builder().shared_cache(false).build());
        assert!(private_cache.is_response_cacheable(
            &request,
            &response(200, &[("cache-control", "private")])
        ));
    }

    #[test]
    fn oversized_declared_length_refused() {
        let request = get("http://example.com/a");
        assert!(!policy().is_response_cacheable(
            &request,
            &response(200, &[("content-length", "10000")])
        ));
        assert!(policy().is_response_cacheable(
            &request,
            &response(200, &[("content-length", "100")])
        ));
    }

    #[test]
    fn ambiguous_headers_refused() {
        let request = get("http://example.com/a");
        assert!(!policy().is_response_cacheable(
            &request,
            &response(
                200,
                &[("content-length", "3"), ("content-length", "4")]
            )
        ));
        assert!(!policy().is_response_cacheable(
            &request,
            &response(
                200,
                &[
                    ("date", "Sun, 06 Nov 1994 08:49:37 GMT"),
                    ("date", "Mon, 07 Nov 1994 08:49:37 GMT")
                ]
            )
        ));
    }

    #[test]
    fn query_uris_need_explicit_freshness() {
        let request = get("http://example.com/a?page=2");
        assert!(!policy().is_response_cacheable(&request, &response(200, &[])));
        assert!(policy().is_response_cacheable(
            &request,
            &response(200, &[("cache-control", "max-age=60")])
        ));
    }
}
