//! Materializes stored entries into HTTP responses.

use chrono::{DateTime, Utc};
use http::header::{
    HeaderValue, AGE, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_LOCATION, DATE, ETAG, EXPIRES, VARY,
    WARNING,
};
use http::StatusCode;
use http_body::Body as HttpBody;

use cachet_core::date::format_http_date;
use cachet_core::{CacheBody, CacheEntry, CacheResponse};

use crate::validity::ValidityPolicy;

const ONE_DAY_SECS: i64 = 86_400;

/// `Warning: 110` — the served response is stale.
pub(crate) fn warning_stale() -> HeaderValue {
    HeaderValue::from_static("110 cachet \"Response is stale\"")
}

/// `Warning: 111` — revalidation against the origin failed.
pub(crate) fn warning_revalidation_failed() -> HeaderValue {
    HeaderValue::from_static("111 cachet \"Revalidation failed\"")
}

/// `Warning: 113` — served under heuristic expiration past 24 hours.
fn warning_heuristic_expiration() -> HeaderValue {
    HeaderValue::from_static("113 cachet \"Heuristic expiration\"")
}

/// Headers a `304 Not Modified` generated from a stored entry carries
/// (RFC 2616 §10.3.5).
const NOT_MODIFIED_HEADERS: [http::header::HeaderName; 6] =
    [DATE, ETAG, CONTENT_LOCATION, EXPIRES, CACHE_CONTROL, VARY];

/// Turns stored entries into full responses or `304`s.
#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    validity: ValidityPolicy,
}

impl ResponseGenerator {
    /// Creates a generator sharing the given validity policy.
    pub fn new(validity: ValidityPolicy) -> Self {
        Self { validity }
    }

    /// Full response over the entry's stored body.
    ///
    /// Sets `Age` to the entry's current age and adds `Warning: 113` when a
    /// response older than a day is served under a freshness lifetime that
    /// long (RFC 2616 §13.2.4).
    pub fn generate_response<B>(&self, entry: &CacheEntry, now: DateTime<Utc>) -> CacheResponse<B>
    where
        B: HttpBody<Data = bytes::Bytes>,
    {
        let mut builder = http::Response::builder()
            .status(entry.status())
            .version(entry.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = entry.headers().clone();

            let current_age = self.validity.current_age_secs(entry, now);
            if let Ok(age) = HeaderValue::from_str(&current_age.to_string()) {
                headers.insert(AGE, age);
            }
            if !headers.contains_key(CONTENT_LENGTH) {
                if let Ok(length) = HeaderValue::from_str(&entry.resource().len().to_string()) {
                    headers.insert(CONTENT_LENGTH, length);
                }
            }
            if current_age >= ONE_DAY_SECS
                && self.validity.freshness_lifetime_secs(entry) > ONE_DAY_SECS
            {
                headers.append(WARNING, warning_heuristic_expiration());
            }
        }
        builder
            .body(CacheBody::full(entry.resource().bytes()))
            .expect("response rebuilt from stored parts")
    }

    /// `304 Not Modified` carrying only the §10.3.5 header subset.
    pub fn generate_not_modified_response<B>(&self, entry: &CacheEntry) -> CacheResponse<B>
    where
        B: HttpBody<Data = bytes::Bytes>,
    {
        let mut builder = http::Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .version(entry.version());
        if let Some(headers) = builder.headers_mut() {
            for name in NOT_MODIFIED_HEADERS {
                for value in entry.headers().get_all(&name) {
                    headers.append(name.clone(), value.clone());
                }
            }
            if !headers.contains_key(DATE) {
                if let Ok(date) = HeaderValue::from_str(&format_http_date(Utc::now())) {
                    headers.insert(DATE, date);
                }
            }
        }
        builder
            .body(CacheBody::empty())
            .expect("response rebuilt from stored parts")
    }
}
