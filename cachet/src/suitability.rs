//! Matches a stored entry against a live request.

use chrono::{DateTime, Utc};
use http::header::{
    HeaderName, CACHE_CONTROL, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE,
};
use http::HeaderMap;

use cachet_core::date::parse_http_date;
use cachet_core::directives::{delta_seconds, directives};
use cachet_core::{CacheEntry, CacheRequest};

use crate::validity::{request_forbids_cache, ValidityPolicy};

const CONDITIONAL_HEADERS: [HeaderName; 5] = [
    IF_NONE_MATCH,
    IF_MODIFIED_SINCE,
    IF_MATCH,
    IF_UNMODIFIED_SINCE,
    IF_RANGE,
];

/// Decides whether a stored entry can answer a live request.
#[derive(Debug, Clone)]
pub struct SuitabilityChecker {
    validity: ValidityPolicy,
}

impl SuitabilityChecker {
    /// Creates a checker sharing the given validity policy.
    pub fn new(validity: ValidityPolicy) -> Self {
        Self { validity }
    }

    /// Full suitability test: method, variant selection, freshness (or
    /// permitted staleness), request directives and conditional headers.
    pub fn can_cached_response_be_used(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        if request.method() != entry.request_method() {
            return false;
        }
        if !self.variant_matches(request, entry) {
            return false;
        }
        if !self.validity.is_fresh(entry, now) && !self.staleness_permitted(request, entry, now)
        {
            return false;
        }
        if request_forbids_cache(request) {
            return false;
        }
        if !self.request_directives_allow(request, entry, now) {
            return false;
        }
        if self.is_conditional(request) && !self.all_conditionals_match(request, entry, now) {
            return false;
        }
        true
    }

    /// Whether the request carries any conditional header.
    pub fn is_conditional(&self, request: &CacheRequest) -> bool {
        CONDITIONAL_HEADERS
            .iter()
            .any(|name| request.headers().contains_key(name))
    }

    /// Whether every conditional the request carries is satisfied by the
    /// entry. Used to answer `304 Not Modified` from a suitable entry.
    pub fn all_conditionals_match(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        // Range validation over stored entries is unsupported.
        if request.headers().contains_key(IF_RANGE) {
            return false;
        }
        if request.headers().contains_key(IF_NONE_MATCH)
            && !self.etag_matches(request.headers(), &IF_NONE_MATCH, entry, false)
        {
            return false;
        }
        if request.headers().contains_key(IF_MATCH)
            && !self.etag_matches(request.headers(), &IF_MATCH, entry, true)
        {
            return false;
        }
        if let Some(since) = header_date(request.headers(), &IF_MODIFIED_SINCE) {
            if !self.unmodified_since(entry, since, now) {
                return false;
            }
        } else if request.headers().contains_key(IF_MODIFIED_SINCE) {
            return false;
        }
        if let Some(since) = header_date(request.headers(), &IF_UNMODIFIED_SINCE) {
            if !self.unmodified_since(entry, since, now) {
                return false;
            }
        } else if request.headers().contains_key(IF_UNMODIFIED_SINCE) {
            return false;
        }
        true
    }

    /// Variant selection: the request must present the same values for the
    /// entry's `Vary` headers that produced the entry. `Vary: *` never
    /// matches (RFC 2616 §13.6).
    fn variant_matches(&self, request: &CacheRequest, entry: &CacheEntry) -> bool {
        let vary = entry.vary();
        if vary.iter().any(|name| name == "*") {
            return false;
        }
        for name in vary {
            let Ok(header) = name.parse::<HeaderName>() else {
                return false;
            };
            let live = joined_values(request.headers(), &header);
            let stored = entry
                .selecting_headers()
                .iter()
                .find(|(stored_name, _)| *stored_name == header)
                .and_then(|(_, value)| value.as_ref())
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            if live != stored {
                return false;
            }
        }
        true
    }

    fn staleness_permitted(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        for directive in directives(request.headers(), &CACHE_CONTROL) {
            if directive.name() == "max-stale" {
                return match directive.value() {
                    None => true,
                    Some(value) => match delta_seconds(value) {
                        Some(limit) => self.validity.staleness_secs(entry, now) <= limit,
                        None => false,
                    },
                };
            }
        }
        false
    }

    fn request_directives_allow(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        for directive in directives(request.headers(), &CACHE_CONTROL) {
            match directive.name() {
                "min-fresh" => {
                    let Some(required) = directive.value().and_then(delta_seconds) else {
                        return false;
                    };
                    let remaining = self.validity.freshness_lifetime_secs(entry)
                        - self.validity.current_age_secs(entry, now);
                    if remaining < required {
                        return false;
                    }
                }
                "max-age" => {
                    let Some(limit) = directive.value().and_then(delta_seconds) else {
                        return false;
                    };
                    if self.validity.current_age_secs(entry, now) > limit {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }

    fn etag_matches(
        &self,
        headers: &HeaderMap,
        header: &HeaderName,
        entry: &CacheEntry,
        strong: bool,
    ) -> bool {
        let Some(entry_etag) = entry.etag() else {
            return false;
        };
        if strong && entry_etag.starts_with("W/") {
            return false;
        }
        for value in headers.get_all(header) {
            let Ok(value) = value.to_str() else { continue };
            for candidate in value.split(',').map(str::trim) {
                if candidate == "*" {
                    return true;
                }
                let matched = if strong {
                    candidate == entry_etag
                } else {
                    strip_weak(candidate) == strip_weak(entry_etag)
                };
                if matched {
                    return true;
                }
            }
        }
        false
    }

    fn unmodified_since(
        &self,
        entry: &CacheEntry,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        // A date from the future cannot validate anything.
        if since > now {
            return false;
        }
        match entry.last_modified() {
            Some(last_modified) => last_modified <= since,
            None => false,
        }
    }
}

fn strip_weak(etag: &str) -> &str {
    etag.strip_prefix("W/").unwrap_or(etag)
}

fn header_date(headers: &HeaderMap, name: &HeaderName) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}

fn joined_values(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}
