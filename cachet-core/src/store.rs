//! The storage seam.
//!
//! A [`CacheStore`] persists entries, maintains variant maps and performs
//! request-driven invalidation. Implementations must make single-key
//! `update`, `insert` and `invalidate` operations atomic with respect to
//! single-key lookups; the orchestrator provides no mutual exclusion of its
//! own across concurrent requests for the same key.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::backend::CacheRequest;
use crate::entry::CacheEntry;
use crate::error::StorageError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StorageError>;

/// One representation of a varying resource.
#[derive(Debug, Clone)]
pub struct Variant {
    variant_key: String,
    cache_key: String,
    entry: CacheEntry,
}

impl Variant {
    /// Creates a variant record.
    pub fn new(
        variant_key: impl Into<String>,
        cache_key: impl Into<String>,
        entry: CacheEntry,
    ) -> Self {
        Self {
            variant_key: variant_key.into(),
            cache_key: cache_key.into(),
            entry,
        }
    }

    /// Deterministic key over the selecting request headers.
    pub fn variant_key(&self) -> &str {
        &self.variant_key
    }

    /// Storage key the variant entry lives under.
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// The stored representation.
    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }
}

/// Storage substrate for cache entries. Thread-safe.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up the entry matching the request, resolving variant
    /// indirection when the resource varies.
    async fn get_cache_entry(&self, request: &CacheRequest) -> StoreResult<Option<CacheEntry>>;

    /// Returns all known variants of the requested resource, keyed by their
    /// entity tags. Empty when the resource does not vary or has no stored
    /// representations.
    async fn get_variant_cache_entries_with_etags(
        &self,
        request: &CacheRequest,
    ) -> StoreResult<HashMap<String, Variant>>;

    /// Persists a backend response and returns the stored entry.
    ///
    /// `request_date` and `response_date` bracket the backend exchange that
    /// produced the response.
    async fn cache_and_return_response(
        &self,
        request: &CacheRequest,
        response: &http::response::Parts,
        body: Bytes,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> StoreResult<CacheEntry>;

    /// Replaces `entry` with its refresh under a `304 Not Modified`,
    /// preserving the body handle. Returns the updated entry.
    async fn update_cache_entry(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        not_modified: &http::response::Parts,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> StoreResult<CacheEntry>;

    /// Like [`update_cache_entry`](Self::update_cache_entry), but for a
    /// variant entry stored under `variant_cache_key`.
    #[allow(clippy::too_many_arguments)]
    async fn update_variant_cache_entry(
        &self,
        conditional_request: &CacheRequest,
        entry: &CacheEntry,
        not_modified: &http::response::Parts,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
        variant_cache_key: &str,
    ) -> StoreResult<CacheEntry>;

    /// Promotes the variant to most-recently-used for the requested
    /// resource and records it in the root entry's variant map.
    async fn reuse_variant_entry_for(
        &self,
        request: &CacheRequest,
        variant: &Variant,
    ) -> StoreResult<()>;

    /// Removes the entry (and its variants) stored for the request URI.
    async fn flush_cache_entries_for(&self, request: &CacheRequest) -> StoreResult<()>;

    /// Removes entries invalidated by an unsafe request: the effective
    /// request URI plus any same-authority `Location` /
    /// `Content-Location` targets it names (RFC 2616 §13.10).
    async fn flush_invalidated_cache_entries_for(
        &self,
        request: &CacheRequest,
    ) -> StoreResult<()>;
}
