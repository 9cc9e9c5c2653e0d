//! Derives conditional (and unconditional) requests from stored entries.

use std::collections::HashMap;

use http::header::{
    HeaderValue, CACHE_CONTROL, ETAG, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE, LAST_MODIFIED, PRAGMA,
};

use cachet_core::{clone_request, CacheEntry, CacheRequest, Variant};

/// Builds the revalidation requests the orchestrator sends upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRequestBuilder;

impl ConditionalRequestBuilder {
    /// Clones the request and attaches the entry's validators
    /// (`If-None-Match` from `ETag`, `If-Modified-Since` from
    /// `Last-Modified`).
    ///
    /// With neither validator present the clone is returned unchanged;
    /// callers check `is_revalidatable` first.
    pub fn build_conditional_request(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
    ) -> CacheRequest {
        let mut conditional = clone_request(request);
        if let Some(etag) = entry.first_header(ETAG) {
            conditional.headers_mut().insert(IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = entry.first_header(LAST_MODIFIED) {
            conditional
                .headers_mut()
                .insert(IF_MODIFIED_SINCE, last_modified.clone());
        }
        conditional
    }

    /// Clones the request and sets `If-None-Match` to every known variant's
    /// entity tag, inviting the origin to pick one with a `304`.
    ///
    /// Tags are emitted in sorted order so the header is deterministic.
    pub fn build_conditional_request_from_variants(
        &self,
        request: &CacheRequest,
        variants: &HashMap<String, Variant>,
    ) -> CacheRequest {
        let mut conditional = clone_request(request);
        let mut etags: Vec<&str> = variants.keys().map(String::as_str).collect();
        etags.sort_unstable();
        if let Ok(value) = HeaderValue::from_str(&etags.join(", ")) {
            conditional.headers_mut().insert(IF_NONE_MATCH, value);
        }
        conditional
    }

    /// Clones the request, strips every conditional header and demands an
    /// end-to-end reload (`Cache-Control: no-cache`, `Pragma: no-cache`).
    ///
    /// Used for the single unconditional retry after a clock-skewed or
    /// unusable `304` (RFC 2616 §13.2.6).
    pub fn build_unconditional_request(&self, request: &CacheRequest) -> CacheRequest {
        let mut unconditional = clone_request(request);
        let headers = unconditional.headers_mut();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        for name in [
            IF_RANGE,
            IF_MATCH,
            IF_NONE_MATCH,
            IF_UNMODIFIED_SINCE,
            IF_MODIFIED_SINCE,
        ] {
            headers.remove(name);
        }
        unconditional
    }
}
