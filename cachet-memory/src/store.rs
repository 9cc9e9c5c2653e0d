//! In-memory cache store.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use http::header::{HeaderValue, CONTENT_LOCATION, LOCATION, VARY};
use http::{HeaderMap, Uri};
use tracing::debug;

use cachet_core::resource::ResourceFactory;
use cachet_core::{CacheEntry, CacheRequest, CacheStore, StoreResult, Variant};

use crate::keygen;
use crate::resource::HeapResourceFactory;

/// Concurrent in-memory [`CacheStore`].
///
/// Entries are indexed by canonical request URI; varying resources store a
/// root entry whose variant map points at per-representation keys. All
/// single-key operations go through the underlying concurrent map and are
/// atomic with respect to each other.
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
    resources: Box<dyn ResourceFactory>,
}

impl MemoryCacheStore {
    /// Store with an uncapped heap resource factory.
    pub fn new() -> Self {
        Self::with_resource_factory(HeapResourceFactory::new())
    }

    /// Store allocating bodies through the given factory.
    pub fn with_resource_factory<F>(factory: F) -> Self
    where
        F: ResourceFactory + 'static,
    {
        Self {
            entries: DashMap::new(),
            resources: Box::new(factory),
        }
    }

    /// Number of stored entries, variant representations included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flush_key(&self, key: &str) {
        if let Some((_, root)) = self.entries.remove(key) {
            debug!(key, "flushed cache entry");
            for variant_key in root.variant_map().values() {
                self.entries.remove(variant_key);
            }
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_cache_entry(&self, request: &CacheRequest) -> StoreResult<Option<CacheEntry>> {
        let key = keygen::cache_key(request);
        let Some(root) = self.entries.get(&key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        if !root.has_variants() {
            return Ok(Some(root));
        }
        let variant_key = keygen::variant_key(&root.vary(), request);
        match root.variant_map().get(&variant_key) {
            Some(variant_cache_key) => Ok(self
                .entries
                .get(variant_cache_key)
                .map(|entry| entry.value().clone())),
            None => Ok(None),
        }
    }

    async fn get_variant_cache_entries_with_etags(
        &self,
        request: &CacheRequest,
    ) -> StoreResult<HashMap<String, Variant>> {
        let key = keygen::cache_key(request);
        let mut variants = HashMap::new();
        let Some(root) = self.entries.get(&key).map(|entry| entry.value().clone()) else {
            return Ok(variants);
        };
        for (variant_key, variant_cache_key) in root.variant_map() {
            let Some(entry) = self
                .entries
                .get(variant_cache_key)
                .map(|entry| entry.value().clone())
            else {
                continue;
            };
            if let Some(etag) = entry.etag() {
                variants.insert(
                    etag.to_owned(),
                    Variant::new(variant_key.clone(), variant_cache_key.clone(), entry),
                );
            }
        }
        Ok(variants)
    }

    async fn cache_and_return_response(
        &self,
        request: &CacheRequest,
        response: &http::response::Parts,
        body: Bytes,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> StoreResult<CacheEntry> {
        let key = keygen::cache_key(request);
        let resource = self.resources.generate(&key, body)?;

        let vary = vary_names(&response.headers);
        let selecting = keygen::selecting_headers(&vary, request);
        let entry = CacheEntry::new(
            request_date,
            response_date,
            response.status,
            response.version,
            response.headers.clone(),
            resource,
            request.method().clone(),
            selecting,
        );

        if vary.is_empty() {
            self.entries.insert(key, entry.clone());
            return Ok(entry);
        }

        let variant_key = keygen::variant_key(&vary, request);
        let variant_cache_key = keygen::variant_cache_key(&variant_key, &key);
        self.entries
            .insert(variant_cache_key.clone(), entry.clone());

        // The root entry mirrors the newest representation and carries the
        // accumulated variant map.
        let root_template = entry.clone();
        self.entries
            .entry(key)
            .and_modify(|root| {
                let mut map = root.variant_map().clone();
                map.insert(variant_key.clone(), variant_cache_key.clone());
                *root = root_template.clone().with_variant_map(map);
            })
            .or_insert_with(|| {
                let mut map = HashMap::new();
                map.insert(variant_key.clone(), variant_cache_key.clone());
                root_template.clone().with_variant_map(map)
            });

        Ok(entry)
    }

    async fn update_cache_entry(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        not_modified: &http::response::Parts,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> StoreResult<CacheEntry> {
        let key = keygen::cache_key(request);
        let updated = entry.refreshed(not_modified, request_date, response_date);
        self.entries.insert(key, updated.clone());
        Ok(updated)
    }

    async fn update_variant_cache_entry(
        &self,
        _conditional_request: &CacheRequest,
        entry: &CacheEntry,
        not_modified: &http::response::Parts,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
        variant_cache_key: &str,
    ) -> StoreResult<CacheEntry> {
        let updated = entry.refreshed(not_modified, request_date, response_date);
        self.entries
            .insert(variant_cache_key.to_owned(), updated.clone());
        Ok(updated)
    }

    async fn reuse_variant_entry_for(
        &self,
        request: &CacheRequest,
        variant: &Variant,
    ) -> StoreResult<()> {
        let key = keygen::cache_key(request);
        let promoted = variant.entry().clone();
        let variant_key = variant.variant_key().to_owned();
        let variant_cache_key = variant.cache_key().to_owned();

        self.entries
            .entry(key)
            .and_modify(|root| {
                let mut map = root.variant_map().clone();
                map.insert(variant_key.clone(), variant_cache_key.clone());
                *root = promoted.clone().with_variant_map(map);
            })
            .or_insert_with(|| {
                let mut map = HashMap::new();
                map.insert(variant_key.clone(), variant_cache_key.clone());
                promoted.clone().with_variant_map(map)
            });
        Ok(())
    }

    async fn flush_cache_entries_for(&self, request: &CacheRequest) -> StoreResult<()> {
        self.flush_key(&keygen::cache_key(request));
        Ok(())
    }

    async fn flush_invalidated_cache_entries_for(
        &self,
        request: &CacheRequest,
    ) -> StoreResult<()> {
        self.flush_key(&keygen::cache_key(request));
        for header in [LOCATION, CONTENT_LOCATION] {
            if let Some(value) = request.headers().get(header) {
                if let Some(target) = resolve_same_origin_target(request.uri(), value) {
                    self.flush_key(&target);
                }
            }
        }
        Ok(())
    }
}

/// Lowercased header names listed in the response's `Vary`.
fn vary_names(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Resolves a `Location`-style target to a cache key, but only when it
/// points at the same scheme and authority as the request; a cache must
/// not let an origin invalidate entries for other origins.
fn resolve_same_origin_target(request_uri: &Uri, value: &HeaderValue) -> Option<String> {
    let value = value.to_str().ok()?;
    let target: Uri = value.parse().ok()?;

    match target.authority() {
        Some(authority) => {
            let same_authority = request_uri
                .authority()
                .is_some_and(|a| a.as_str().eq_ignore_ascii_case(authority.as_str()));
            let same_scheme = request_uri
                .scheme_str()
                .unwrap_or("http")
                .eq_ignore_ascii_case(target.scheme_str().unwrap_or("http"));
            (same_authority && same_scheme).then(|| keygen::canonical_uri(&target))
        }
        None => {
            let scheme = request_uri.scheme_str()?;
            let authority = request_uri.authority()?;
            let resolved = Uri::builder()
                .scheme(scheme)
                .authority(authority.clone())
                .path_and_query(value)
                .build()
                .ok()?;
            Some(keygen::canonical_uri(&resolved))
        }
    }
}
