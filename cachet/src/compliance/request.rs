//! Inbound request screening and normalization.

use http::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, EXPECT, IF_MATCH, IF_RANGE, MAX_FORWARDS, PRAGMA,
    RANGE,
};
use http::{Method, StatusCode, Version};
use http_body::Body as HttpBody;

use cachet_core::directives::directives;
use cachet_core::{CacheBody, CacheRequest, CacheResponse, RequestProtocolError};

const KNOWN_METHODS: [Method; 8] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

/// Screens inbound requests and rewrites them into compliant form.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestCompliance;

impl RequestCompliance {
    /// Fatal noncompliance kinds present on the request, in detection
    /// order. A non-empty result short-circuits dispatch.
    pub fn fatal_errors(&self, request: &CacheRequest) -> Vec<RequestProtocolError> {
        let mut errors = Vec::new();

        if !KNOWN_METHODS.contains(request.method()) {
            errors.push(RequestProtocolError::UnknownMethod);
        }
        let version = request.version();
        if version != Version::HTTP_09 && version != Version::HTTP_10 && version != Version::HTTP_11
        {
            errors.push(RequestProtocolError::UnsupportedHttpVersion);
        }
        if request.headers().contains_key(RANGE) && has_weak_etag(request, &IF_RANGE) {
            errors.push(RequestProtocolError::WeakEtagOnRange);
        }
        if (request.method() == Method::PUT || request.method() == Method::DELETE)
            && has_weak_etag(request, &IF_MATCH)
        {
            errors.push(RequestProtocolError::WeakEtagOnStateChanging);
        }
        if let Some(expect) = request.headers().get(EXPECT) {
            let valid = expect
                .to_str()
                .map(|value| value.eq_ignore_ascii_case("100-continue"))
                .unwrap_or(false);
            if !valid {
                errors.push(RequestProtocolError::InvalidExpectDirective);
            }
        }
        errors
    }

    /// The synthesized response answering a fatal error.
    pub fn error_response<B>(&self, error: RequestProtocolError) -> CacheResponse<B>
    where
        B: HttpBody<Data = bytes::Bytes>,
    {
        let status = match error {
            RequestProtocolError::UnknownMethod => StatusCode::NOT_IMPLEMENTED,
            RequestProtocolError::WeakEtagOnRange
            | RequestProtocolError::WeakEtagOnStateChanging => StatusCode::BAD_REQUEST,
            RequestProtocolError::InvalidExpectDirective => StatusCode::EXPECTATION_FAILED,
            RequestProtocolError::UnsupportedHttpVersion => {
                StatusCode::HTTP_VERSION_NOT_SUPPORTED
            }
        };
        http::Response::builder()
            .status(status)
            .header(CONTENT_LENGTH, HeaderValue::from_static("0"))
            .body(CacheBody::empty())
            .expect("synthesized error response")
    }

    /// Rewrites the request into compliant form:
    ///
    /// - HTTP/0.9 and HTTP/1.0 requests are upgraded to HTTP/1.1;
    /// - a malformed `Max-Forwards` on `OPTIONS` is dropped;
    /// - repeated cache directives are deduplicated.
    pub fn make_request_compliant(&self, mut request: CacheRequest) -> CacheRequest {
        if request.version() == Version::HTTP_09 || request.version() == Version::HTTP_10 {
            *request.version_mut() = Version::HTTP_11;
        }

        if request.method() == Method::OPTIONS {
            let malformed = request
                .headers()
                .get(MAX_FORWARDS)
                .is_some_and(|value| {
                    value
                        .to_str()
                        .ok()
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .is_none()
                });
            if malformed {
                request.headers_mut().remove(MAX_FORWARDS);
            }
        }

        for header in [CACHE_CONTROL, PRAGMA] {
            dedupe_directives(&mut request, &header);
        }
        request
    }
}

fn has_weak_etag(request: &CacheRequest, header: &http::header::HeaderName) -> bool {
    request
        .headers()
        .get_all(header)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|etag| etag.trim().starts_with("W/"))
}

/// Collapses repeated directives across all instances of `header` into a
/// single header value, first occurrence wins.
fn dedupe_directives(request: &mut CacheRequest, header: &http::header::HeaderName) {
    let parsed: Vec<_> = directives(request.headers(), header).collect();
    if parsed.is_empty() {
        return;
    }
    let mut seen = Vec::new();
    let mut elements = Vec::new();
    for directive in parsed {
        if seen.contains(&directive.name().to_owned()) {
            continue;
        }
        seen.push(directive.name().to_owned());
        match directive.value() {
            Some(value) => elements.push(format!("{}={}", directive.name(), value)),
            None => elements.push(directive.name().to_owned()),
        }
    }
    if let Ok(value) = HeaderValue::from_str(&elements.join(", ")) {
        request.headers_mut().insert(header.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(method: &str, headers: &[(&str, &str)]) -> CacheRequest {
        let mut builder = http::Request::builder()
            .method(method)
            .uri("http://example.com/a");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    #[test]
    fn plain_get_is_compliant() {
        assert!(RequestCompliance.fatal_errors(&request("GET", &[])).is_empty());
    }

    #[test]
    fn unknown_method_is_fatal() {
        let errors = RequestCompliance.fatal_errors(&request("FROBNICATE", &[]));
        assert_eq!(errors, vec![RequestProtocolError::UnknownMethod]);
    }

    #[test]
    fn weak_etag_with_range_is_fatal() {
        let errors = RequestCompliance.fatal_errors(&request(
            "GET",
            &[("range", "bytes=0-99"), ("if-range", "W/\"v1\"")],
        ));
        assert_eq!(errors, vec![RequestProtocolError::WeakEtagOnRange]);
    }

    #[test]
    fn weak_etag_if_match_on_put_is_fatal() {
        let errors =
            RequestCompliance.fatal_errors(&request("PUT", &[("if-match", "W/\"v1\"")]));
        assert_eq!(errors, vec![RequestProtocolError::WeakEtagOnStateChanging]);

        let errors =
            RequestCompliance.fatal_errors(&request("GET", &[("if-match", "W/\"v1\"")]));
        assert!(errors.is_empty());
    }

    #[test]
    fn invalid_expect_is_fatal() {
        let errors =
            RequestCompliance.fatal_errors(&request("POST", &[("expect", "402-payment")]));
        assert_eq!(errors, vec![RequestProtocolError::InvalidExpectDirective]);

        let errors =
            RequestCompliance.fatal_errors(&request("POST", &[("expect", "100-continue")]));
        assert!(errors.is_empty());
    }

    #[test]
    fn error_responses_map_to_statuses() {
        type B = http_body_util::Full<Bytes>;
        let compliance = RequestCompliance;
        let response: CacheResponse<B> =
            compliance.error_response(RequestProtocolError::UnknownMethod);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        let response: CacheResponse<B> =
            compliance.error_response(RequestProtocolError::WeakEtagOnRange);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response: CacheResponse<B> =
            compliance.error_response(RequestProtocolError::InvalidExpectDirective);
        assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
        let response: CacheResponse<B> =
            compliance.error_response(RequestProtocolError::UnsupportedHttpVersion);
        assert_eq!(response.status(), StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    #[test]
    fn old_versions_upgraded() {
        let mut req = request("GET", &[]);
        *req.version_mut() = Version::HTTP_10;
        let compliant = RequestCompliance.make_request_compliant(req);
        assert_eq!(compliant.version(), Version::HTTP_11);
    }

    #[test]
    fn malformed_max_forwards_dropped_on_options() {
        let req = request("OPTIONS", &[("max-forwards", "banana")]);
        let compliant = RequestCompliance.make_request_compliant(req);
        assert!(compliant.headers().get(MAX_FORWARDS).is_none());

        let req = request("OPTIONS", &[("max-forwards", "0")]);
        let compliant = RequestCompliance.make_request_compliant(req);
        assert_eq!(compliant.headers().get(MAX_FORWARDS).unwrap(), "0");
    }

    #[test]
    fn duplicate_cache_directives_collapsed() {
        let req = request(
            "GET",
            &[
                ("cache-control", "no-cache, max-age=60"),
                ("cache-control", "no-cache, max-age=120"),
            ],
        );
        let compliant = RequestCompliance.make_request_compliant(req);
        let values: Vec<_> = compliant
            .headers()
            .get_all(CACHE_CONTROL)
            .iter()
            .collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "no-cache, max-age=60");
    }
}
