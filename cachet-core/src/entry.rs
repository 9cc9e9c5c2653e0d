//! The stored artifact for one origin exchange.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};

use crate::date::parse_http_date;
use crate::resource::SharedResource;

/// `Age` value substituted for a malformed header: old enough to be treated
/// as arbitrarily stale (RFC 2616 §14.6).
const MALFORMED_AGE_SECS: i64 = u32::MAX as i64;

/// A persisted record of one origin response.
///
/// Entries are immutable once created. A revalidation that refreshes an
/// entry's headers produces a *new* entry via [`CacheEntry::refreshed`]; the
/// new entry inherits the prior body handle. Concurrent readers holding the
/// replaced entry keep a valid handle until they drop it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    request_date: DateTime<Utc>,
    response_date: DateTime<Utc>,
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    resource: SharedResource,
    request_method: Method,
    selecting_headers: Vec<(HeaderName, Option<HeaderValue>)>,
    variant_map: HashMap<String, String>,
}

impl CacheEntry {
    /// Creates an entry from the parts of one backend exchange.
    ///
    /// `request_date` and `response_date` are the wall-clock readings taken
    /// immediately before and after the exchange; `response_date` must not
    /// precede `request_date`. `selecting_headers` snapshots the request
    /// headers named by the response's `Vary`, used later to decide whether
    /// a live request selects this representation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
        resource: SharedResource,
        request_method: Method,
        selecting_headers: Vec<(HeaderName, Option<HeaderValue>)>,
    ) -> Self {
        debug_assert!(response_date >= request_date);
        Self {
            request_date,
            response_date,
            status,
            version,
            headers,
            resource,
            request_method,
            selecting_headers,
            variant_map: HashMap::new(),
        }
    }

    /// Returns a copy of this entry carrying the given variant map.
    pub fn with_variant_map(mut self, variant_map: HashMap<String, String>) -> Self {
        self.variant_map = variant_map;
        self
    }

    /// Wall-clock reading taken before the producing exchange.
    pub fn request_date(&self) -> DateTime<Utc> {
        self.request_date
    }

    /// Wall-clock reading taken after the producing exchange.
    pub fn response_date(&self) -> DateTime<Utc> {
        self.response_date
    }

    /// Status code of the stored response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the stored status, if one exists.
    pub fn status_reason(&self) -> Option<&'static str> {
        self.status.canonical_reason()
    }

    /// Protocol version of the stored response.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Stored response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Handle to the stored payload.
    pub fn resource(&self) -> &SharedResource {
        &self.resource
    }

    /// The request method that produced this entry.
    pub fn request_method(&self) -> &Method {
        &self.request_method
    }

    /// Request header values this representation was selected by, one pair
    /// per header named in the response's `Vary`.
    pub fn selecting_headers(&self) -> &[(HeaderName, Option<HeaderValue>)] {
        &self.selecting_headers
    }

    /// Mapping from variant key to variant cache key. Non-empty only on the
    /// root entry of a varying resource.
    pub fn variant_map(&self) -> &HashMap<String, String> {
        &self.variant_map
    }

    /// First value of the named header.
    pub fn first_header(&self, name: impl header::AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// First value of the named header as a string.
    pub fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.first_header(name).and_then(|v| v.to_str().ok())
    }

    /// The entry's entity tag, verbatim (including any `W/` prefix).
    pub fn etag(&self) -> Option<&str> {
        self.header_str(header::ETAG)
    }

    /// Parsed `Last-Modified`, if present and well-formed.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.header_str(header::LAST_MODIFIED)
            .and_then(parse_http_date)
    }

    /// Parsed origin `Date` header, if present and well-formed.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header_str(header::DATE).and_then(parse_http_date)
    }

    /// Parsed `Expires`, if present and well-formed.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.header_str(header::EXPIRES).and_then(parse_http_date)
    }

    /// `Age` header in seconds.
    ///
    /// A malformed value is treated as arbitrarily old rather than ignored,
    /// so a garbled upstream cache cannot make a response look fresh.
    pub fn age_header_seconds(&self) -> Option<i64> {
        let value = self.header_str(header::AGE)?;
        Some(match value.trim().parse::<i64>() {
            Ok(secs) if secs >= 0 => secs,
            _ => MALFORMED_AGE_SECS,
        })
    }

    /// Lowercased header names listed in `Vary`, across all instances.
    pub fn vary(&self) -> Vec<String> {
        self.headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Whether this representation varies on request headers.
    pub fn has_variants(&self) -> bool {
        self.headers.contains_key(header::VARY)
    }

    /// Creates the refreshed entry a `304 Not Modified` revalidation
    /// produces (RFC 2616 §13.5.3).
    ///
    /// Stored `Warning` values with 1xx codes are dropped, headers present
    /// in the 304 replace their stored counterparts, and the body handle is
    /// inherited unchanged.
    pub fn refreshed(
        &self,
        not_modified: &http::response::Parts,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> CacheEntry {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if name == &header::WARNING && value.as_bytes().first() == Some(&b'1') {
                continue;
            }
            if not_modified.headers.contains_key(name) {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        for (name, value) in &not_modified.headers {
            headers.append(name.clone(), value.clone());
        }

        CacheEntry {
            request_date,
            response_date,
            status: self.status,
            version: self.version,
            headers,
            resource: self.resource.clone(),
            request_method: self.request_method.clone(),
            selecting_headers: self.selecting_headers.clone(),
            variant_map: self.variant_map.clone(),
        }
    }
}
