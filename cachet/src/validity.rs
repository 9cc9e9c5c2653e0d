//! Freshness and age arithmetic over stored entries.
//!
//! Pure and stateless: every operation is a function of a [`CacheEntry`]
//! and a `now` timestamp, implementing the age calculations of
//! RFC 2616 §13.2.3 and the freshness model of §13.2.4, plus the
//! RFC 5861 `stale-if-error` / `stale-while-revalidate` windows.

use chrono::{DateTime, Utc};
use http::header::{CACHE_CONTROL, PRAGMA};

use cachet_core::directives::{delta_seconds, directive_value, has_directive};
use cachet_core::{CacheEntry, CacheRequest};

use crate::config::CacheConfig;

/// Pure freshness/age arithmetic over a stored entry.
#[derive(Debug, Clone)]
pub struct ValidityPolicy {
    shared_cache: bool,
    heuristic_enabled: bool,
    heuristic_coefficient: f64,
    heuristic_default_lifetime_secs: i64,
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl ValidityPolicy {
    /// Derives the policy from the cache configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            shared_cache: config.shared_cache,
            heuristic_enabled: config.heuristic_caching_enabled,
            heuristic_coefficient: config.heuristic_coefficient,
            heuristic_default_lifetime_secs: config.heuristic_default_lifetime.as_secs() as i64,
        }
    }

    /// `max(0, response_date − Date)`; zero when the origin sent no usable
    /// `Date` header.
    pub fn apparent_age_secs(&self, entry: &CacheEntry) -> i64 {
        let origin_date = entry.date().unwrap_or_else(|| entry.response_date());
        (entry.response_date() - origin_date).num_seconds().max(0)
    }

    /// The larger of the apparent age and the received `Age` header.
    pub fn corrected_received_age_secs(&self, entry: &CacheEntry) -> i64 {
        self.apparent_age_secs(entry)
            .max(entry.age_header_seconds().unwrap_or(0))
    }

    /// Duration of the exchange that produced the entry.
    pub fn response_delay_secs(&self, entry: &CacheEntry) -> i64 {
        (entry.response_date() - entry.request_date())
            .num_seconds()
            .max(0)
    }

    /// Received age corrected for the exchange delay.
    pub fn corrected_initial_age_secs(&self, entry: &CacheEntry) -> i64 {
        self.corrected_received_age_secs(entry)
            .saturating_add(self.response_delay_secs(entry))
    }

    /// Time the entry has been resident in this cache.
    pub fn resident_time_secs(&self, entry: &CacheEntry, now: DateTime<Utc>) -> i64 {
        (now - entry.response_date()).num_seconds().max(0)
    }

    /// The cache's best estimate of the response's age now.
    pub fn current_age_secs(&self, entry: &CacheEntry, now: DateTime<Utc>) -> i64 {
        self.corrected_initial_age_secs(entry)
            .saturating_add(self.resident_time_secs(entry, now))
    }

    /// Server-declared (or heuristic) freshness lifetime in seconds.
    ///
    /// Precedence: `s-maxage` on a shared cache, then `max-age`, then
    /// `Expires − Date`, then the heuristic when enabled, then zero.
    pub fn freshness_lifetime_secs(&self, entry: &CacheEntry) -> i64 {
        if self.shared_cache {
            if let Some(secs) = self.directive_seconds(entry, "s-maxage") {
                return secs;
            }
        }
        if let Some(secs) = self.directive_seconds(entry, "max-age") {
            return secs;
        }
        if let (Some(expires), Some(date)) = (entry.expires(), entry.date()) {
            return (expires - date).num_seconds().max(0);
        }
        if self.heuristic_enabled {
            return self.heuristic_freshness_lifetime_secs(entry);
        }
        0
    }

    /// Heuristic lifetime per RFC 2616 §13.2.4: a fraction of the interval
    /// since last modification, or the configured default.
    fn heuristic_freshness_lifetime_secs(&self, entry: &CacheEntry) -> i64 {
        if let (Some(date), Some(last_modified)) = (entry.date(), entry.last_modified()) {
            let interval = (date - last_modified).num_seconds();
            if interval > 0 {
                return (interval as f64 * self.heuristic_coefficient) as i64;
            }
        }
        self.heuristic_default_lifetime_secs
    }

    /// `freshness_lifetime > current_age`.
    pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        self.freshness_lifetime_secs(entry) > self.current_age_secs(entry, now)
    }

    /// How far past its freshness lifetime the entry is, clamped to zero.
    pub fn staleness_secs(&self, entry: &CacheEntry, now: DateTime<Utc>) -> i64 {
        (self.current_age_secs(entry, now) - self.freshness_lifetime_secs(entry)).max(0)
    }

    /// Whether the entry carries a validator usable in a conditional
    /// request.
    pub fn is_revalidatable(&self, entry: &CacheEntry) -> bool {
        entry.etag().is_some() || entry.first_header(http::header::LAST_MODIFIED).is_some()
    }

    /// Entry carries `Cache-Control: must-revalidate`.
    pub fn must_revalidate(&self, entry: &CacheEntry) -> bool {
        has_directive(entry.headers(), &CACHE_CONTROL, "must-revalidate")
    }

    /// Entry carries `Cache-Control: proxy-revalidate`.
    pub fn proxy_revalidate(&self, entry: &CacheEntry) -> bool {
        has_directive(entry.headers(), &CACHE_CONTROL, "proxy-revalidate")
    }

    /// RFC 5861 `stale-if-error`: the request or the entry allows serving
    /// this entry despite a backend error, and its staleness is still
    /// within the declared window.
    pub fn may_return_stale_if_error(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        let window = directive_value(request.headers(), &CACHE_CONTROL, "stale-if-error")
            .or_else(|| directive_value(entry.headers(), &CACHE_CONTROL, "stale-if-error"))
            .as_deref()
            .and_then(delta_seconds);
        match window {
            Some(window) => self.staleness_secs(entry, now) <= window,
            None => false,
        }
    }

    /// RFC 5861 `stale-while-revalidate`: the entry allows being served
    /// stale while a background revalidation runs.
    pub fn may_return_stale_while_revalidating(
        &self,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        match directive_value(entry.headers(), &CACHE_CONTROL, "stale-while-revalidate")
            .as_deref()
            .and_then(delta_seconds)
        {
            Some(window) => self.staleness_secs(entry, now) <= window,
            None => false,
        }
    }

    fn directive_seconds(&self, entry: &CacheEntry, name: &str) -> Option<i64> {
        directive_value(entry.headers(), &CACHE_CONTROL, name)
            .as_deref()
            .and_then(delta_seconds)
    }
}

/// Whether the request forbids serving from cache outright
/// (`Cache-Control: no-cache`/`no-store` or `Pragma: no-cache`).
pub(crate) fn request_forbids_cache(request: &CacheRequest) -> bool {
    has_directive(request.headers(), &CACHE_CONTROL, "no-cache")
        || has_directive(request.headers(), &CACHE_CONTROL, "no-store")
        || has_directive(request.headers(), &PRAGMA, "no-cache")
}
