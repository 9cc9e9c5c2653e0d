//! Decides whether a request may be answered from cache at all.

use http::header::RANGE;
use http::Method;

use cachet_core::CacheRequest;

use crate::validity::request_forbids_cache;

/// Gate in front of the cache lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestPolicy;

impl RequestPolicy {
    /// Whether the request is a candidate for cache service.
    ///
    /// Only plain `GET` requests qualify: a `Range` request would need the
    /// partial-content machinery this cache does not implement, and a
    /// request carrying `no-store`/`no-cache` (or `Pragma: no-cache`) has
    /// opted out.
    pub fn is_servable_from_cache(&self, request: &CacheRequest) -> bool {
        if request.method() != Method::GET {
            return false;
        }
        if request.headers().contains_key(RANGE) {
            return false;
        }
        !request_forbids_cache(request)
    }
}
