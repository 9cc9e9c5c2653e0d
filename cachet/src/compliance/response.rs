//! Backend response repair.

use http::header::{HeaderValue, AGE, CONTENT_LENGTH, DATE, RANGE};
use http::StatusCode;
use tracing::debug;

use cachet_core::date::format_http_date;
use cachet_core::{CacheRequest, ProtocolError};

/// Repairs backend responses into usable shape, or rejects them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCompliance;

impl ResponseCompliance {
    /// Ensures the response can participate in caching decisions:
    ///
    /// - a `206 Partial Content` we never asked for is unrecoverable;
    /// - a missing `Date` header is synthesized from the local clock;
    /// - exact duplicate `Content-Length` values are collapsed (disagreeing
    ///   values are left for the caching policy to refuse);
    /// - a negative or malformed `Age` is clamped to zero.
    pub fn ensure_protocol_compliance(
        &self,
        request: &CacheRequest,
        response: &mut http::response::Parts,
    ) -> Result<(), ProtocolError> {
        if response.status == StatusCode::PARTIAL_CONTENT
            && !request.headers().contains_key(RANGE)
        {
            return Err(ProtocolError::new(
                "backend returned 206 Partial Content to a request without Range",
            ));
        }

        if !response.headers.contains_key(DATE) {
            debug!("backend response carried no Date header, synthesizing one");
            if let Ok(date) = HeaderValue::from_str(&format_http_date(chrono::Utc::now())) {
                response.headers.insert(DATE, date);
            }
        }

        let lengths: Vec<HeaderValue> = response
            .headers
            .get_all(CONTENT_LENGTH)
            .iter()
            .cloned()
            .collect();
        if lengths.len() > 1 && lengths.iter().all(|value| *value == lengths[0]) {
            response.headers.insert(CONTENT_LENGTH, lengths[0].clone());
        }

        let age_invalid = response.headers.get(AGE).is_some_and(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map_or(true, |secs| secs < 0)
        });
        if age_invalid {
            response.headers.insert(AGE, HeaderValue::from_static("0"));
        }

        Ok(())
    }
}
