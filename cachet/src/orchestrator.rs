//! The request-dispatch state machine.
//!
//! [`CacheOrchestrator::execute`] decides, for each request, whether to
//! answer from the store, to revalidate a stored entry conditionally, or to
//! forward to the backend, and folds the backend's answer back into the
//! store. The decision order is fixed:
//!
//! 1. self-addressed `OPTIONS` probe;
//! 2. fatal request noncompliance;
//! 3. request normalization and `Via` stamping;
//! 4. invalidation on unsafe methods;
//! 5. request cacheability;
//! 6. lookup, then the hit / miss / revalidate / negotiate paths.
//!
//! Concurrency: one `execute` call occupies one task for its duration; the
//! only work multiplexed elsewhere is background revalidation. Concurrent
//! calls for the same key may both reach the backend — the store is
//! responsible for keeping its own single-key operations atomic. A dropped
//! `execute` future aborts any in-flight backend exchange; entries already
//! committed to the store stay valid.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, DATE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    MAX_FORWARDS, VIA, WARNING,
};
use http::{HeaderMap, Method, StatusCode, Version};
use http_body::Body as HttpBody;
use tracing::{debug, warn};

use cachet_core::body::{read_up_to, ReadLimit};
use cachet_core::date::parse_http_date;
use cachet_core::directives::{delta_seconds, directives, has_directive};
use cachet_core::{
    clone_request, Backend, CacheBody, CacheContext, CacheEntry, CacheError, CacheRequest,
    CacheResponse, CacheResponseStatus, CacheStore, StorageError, Variant,
};

use crate::compliance::{RequestCompliance, ResponseCompliance};
use crate::conditional::ConditionalRequestBuilder;
use crate::config::CacheConfig;
use crate::generator::{warning_revalidation_failed, warning_stale, ResponseGenerator};
use crate::policy::{RequestPolicy, ResponsePolicy};
use crate::revalidator::AsynchronousRevalidator;
use crate::suitability::SuitabilityChecker;
use crate::validity::ValidityPolicy;

const VIA_PSEUDONYM: &str = "cachet";

/// Methods whose success invalidates stored entries (RFC 2616 §13.10).
const UNSAFE_METHODS: [Method; 4] = [Method::PUT, Method::POST, Method::DELETE, Method::PATCH];

struct Inner<B, S> {
    backend: B,
    store: S,
    config: CacheConfig,
    validity: ValidityPolicy,
    request_policy: RequestPolicy,
    response_policy: ResponsePolicy,
    suitability: SuitabilityChecker,
    conditional: ConditionalRequestBuilder,
    generator: ResponseGenerator,
    request_compliance: RequestCompliance,
    response_compliance: ResponseCompliance,
    revalidator: Option<AsynchronousRevalidator>,
    hits: AtomicU64,
    misses: AtomicU64,
    updates: AtomicU64,
}

/// The caching layer between an application client and its transport.
///
/// Cloning is cheap and shares all state; background revalidation tasks
/// hold a clone for the duration of their refresh.
pub struct CacheOrchestrator<B, S> {
    inner: Arc<Inner<B, S>>,
}

impl<B, S> Clone for CacheOrchestrator<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, S> std::fmt::Debug for CacheOrchestrator<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("config", &self.inner.config)
            .field("hits", &self.inner.hits.load(Ordering::Relaxed))
            .field("misses", &self.inner.misses.load(Ordering::Relaxed))
            .field("updates", &self.inner.updates.load(Ordering::Relaxed))
            .finish()
    }
}

/// Marker type for unset builder fields.
pub struct NotSet;

impl CacheOrchestrator<NotSet, NotSet> {
    /// Creates a builder for an orchestrator.
    pub fn builder() -> CacheOrchestratorBuilder<NotSet, NotSet> {
        CacheOrchestratorBuilder::new()
    }
}

/// Builder for [`CacheOrchestrator`].
pub struct CacheOrchestratorBuilder<B, S> {
    backend: B,
    store: S,
    config: CacheConfig,
}

impl CacheOrchestratorBuilder<NotSet, NotSet> {
    /// Creates a builder with no backend or store set.
    pub fn new() -> Self {
        Self {
            backend: NotSet,
            store: NotSet,
            config: CacheConfig::default(),
        }
    }
}

impl Default for CacheOrchestratorBuilder<NotSet, NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, S> CacheOrchestratorBuilder<B, S> {
    /// Sets the transport underneath the cache.
    pub fn backend<NB>(self, backend: NB) -> CacheOrchestratorBuilder<NB, S> {
        CacheOrchestratorBuilder {
            backend,
            store: self.store,
            config: self.config,
        }
    }

    /// Sets the storage substrate.
    pub fn store<NS>(self, store: NS) -> CacheOrchestratorBuilder<B, NS> {
        CacheOrchestratorBuilder {
            backend: self.backend,
            store,
            config: self.config,
        }
    }

    /// Sets the cache configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }
}

impl<B, S> CacheOrchestratorBuilder<B, S>
where
    B: Backend,
    S: CacheStore,
{
    /// Builds the orchestrator.
    pub fn build(self) -> CacheOrchestrator<B, S> {
        CacheOrchestrator::new(self.backend, self.store, self.config)
    }
}

impl<B, S> CacheOrchestrator<B, S>
where
    B: Backend,
    S: CacheStore,
{
    /// Creates an orchestrator over the given transport and store.
    pub fn new(backend: B, store: S, config: CacheConfig) -> Self {
        let validity = ValidityPolicy::from_config(&config);
        let revalidator = (config.asynchronous_workers_max > 0)
            .then(|| AsynchronousRevalidator::new(&config));
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                validity: validity.clone(),
                request_policy: RequestPolicy,
                response_policy: ResponsePolicy::from_config(&config),
                suitability: SuitabilityChecker::new(validity.clone()),
                conditional: ConditionalRequestBuilder,
                generator: ResponseGenerator::new(validity),
                request_compliance: RequestCompliance,
                response_compliance: ResponseCompliance,
                revalidator,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                updates: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Times the cache answered a request from a stored entry.
    pub fn cache_hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    /// Times the cache had no entry for a request.
    pub fn cache_misses(&self) -> u64 {
        self.inner.misses.load(Ordering::Relaxed)
    }

    /// Times a stored entry was refreshed by revalidation.
    pub fn cache_updates(&self) -> u64 {
        self.inner.updates.load(Ordering::Relaxed)
    }
}

impl<B, S> CacheOrchestrator<B, S>
where
    B: Backend + 'static,
    <B::Body as HttpBody>::Error: Send,
    S: CacheStore + 'static,
{
    /// Dispatches one request through the cache.
    ///
    /// The context's status records how the request was answered; it is
    /// written as the state machine advances, last write wins.
    pub async fn execute(
        &self,
        request: CacheRequest,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        ctx.set_status(CacheResponseStatus::CacheMiss);

        if is_self_addressed_options(&request) {
            ctx.set_status(CacheResponseStatus::CacheModuleResponse);
            return Ok(self.synthetic_response(StatusCode::NOT_IMPLEMENTED, request.version()));
        }

        if let Some(error) = self
            .inner
            .request_compliance
            .fatal_errors(&request)
            .into_iter()
            .next()
        {
            debug!(?error, "request is fatally noncompliant");
            ctx.set_status(CacheResponseStatus::CacheModuleResponse);
            let mut response = self.inner.request_compliance.error_response(error);
            response
                .headers_mut()
                .append(VIA, via_value(request.version()));
            return Ok(response);
        }

        let mut request = self.inner.request_compliance.make_request_compliant(request);
        let via = via_value(request.version());
        request.headers_mut().append(VIA, via);

        if UNSAFE_METHODS.contains(request.method()) {
            if let Err(error) = self
                .inner
                .store
                .flush_invalidated_cache_entries_for(&request)
                .await
            {
                warn!(%error, "unable to flush invalidated entries from cache");
            }
        }

        if !self.inner.request_policy.is_servable_from_cache(&request) {
            debug!("request is not servable from cache");
            return self.call_backend(request).await;
        }

        let entry = match self.inner.store.get_cache_entry(&request).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "unable to retrieve entries from cache");
                None
            }
        };

        match entry {
            Some(entry) => self.handle_cache_hit(request, entry, ctx).await,
            None => self.handle_cache_miss(request, ctx).await,
        }
    }

    async fn handle_cache_hit(
        &self,
        request: CacheRequest,
        entry: CacheEntry,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
        debug!(uri = %request.uri(), "cache hit");

        let now = Utc::now();
        if self
            .inner
            .suitability
            .can_cached_response_be_used(&request, &entry, now)
        {
            return Ok(self.generate_cached_response(&request, &entry, now, ctx));
        }

        if !may_call_backend(&request) {
            ctx.set_status(CacheResponseStatus::CacheModuleResponse);
            return Ok(self.synthetic_response(StatusCode::GATEWAY_TIMEOUT, request.version()));
        }

        if self.inner.validity.is_revalidatable(&entry) {
            return self.revalidate_cache_entry(request, entry, now, ctx).await;
        }
        self.call_backend(request).await
    }

    async fn handle_cache_miss(
        &self,
        request: CacheRequest,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!(uri = %request.uri(), "cache miss");

        if !may_call_backend(&request) {
            ctx.set_status(CacheResponseStatus::CacheModuleResponse);
            return Ok(self.synthetic_response(StatusCode::GATEWAY_TIMEOUT, request.version()));
        }

        let variants = match self
            .inner
            .store
            .get_variant_cache_entries_with_etags(&request)
            .await
        {
            Ok(variants) => variants,
            Err(error) => {
                warn!(%error, "unable to retrieve variant entries from cache");
                HashMap::new()
            }
        };
        if !variants.is_empty() {
            return self
                .negotiate_response_from_variants(request, variants, ctx)
                .await;
        }

        self.call_backend(request).await
    }

    fn generate_cached_response(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
        ctx: &mut CacheContext,
    ) -> CacheResponse<B::Body> {
        let mut response = if request.headers().contains_key(IF_NONE_MATCH)
            || request.headers().contains_key(IF_MODIFIED_SINCE)
        {
            self.not_modified_response(entry)
        } else {
            self.inner.generator.generate_response(entry, now)
        };
        ctx.set_status(CacheResponseStatus::CacheHit);
        if self.inner.validity.staleness_secs(entry, now) > 0 {
            response.headers_mut().append(WARNING, warning_stale());
        }
        response
    }

    /// Revalidation entry point: serve stale and refresh in the background
    /// when `stale-while-revalidate` allows it, otherwise block on a
    /// conditional exchange; salvage transport failures with the stale
    /// entry when staleness is permitted.
    async fn revalidate_cache_entry(
        &self,
        request: CacheRequest,
        entry: CacheEntry,
        now: DateTime<Utc>,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        debug!("revalidating the cache entry");

        if let Some(revalidator) = &self.inner.revalidator {
            if !self.stale_response_not_allowed(&request, &entry, now)
                && self
                    .inner
                    .validity
                    .may_return_stale_while_revalidating(&entry, now)
            {
                let mut response = self.inner.generator.generate_response(&entry, now);
                response.headers_mut().append(WARNING, warning_stale());
                ctx.set_status(CacheResponseStatus::CacheHit);

                let key = request.uri().to_string();
                let this = self.clone();
                let background_request = clone_request(&request);
                revalidator.revalidate(key, async move {
                    this.background_revalidate(background_request, entry).await;
                });
                return Ok(response);
            }
        }

        match self.synchronous_revalidate(&request, &entry, ctx).await {
            Ok(response) => Ok(response),
            Err(CacheError::Transport(error)) => {
                warn!(%error, "revalidation request failed");
                Ok(self.handle_revalidation_failure(&request, &entry, Utc::now(), ctx))
            }
            Err(other) => Err(other),
        }
    }

    async fn background_revalidate(&self, request: CacheRequest, entry: CacheEntry) {
        let mut ctx = CacheContext::new();
        match self.synchronous_revalidate(&request, &entry, &mut ctx).await {
            Ok(_) => debug!(status = ?ctx.status(), "background revalidation completed"),
            Err(error) => warn!(%error, "background revalidation failed"),
        }
    }

    async fn synchronous_revalidate(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        let conditional = self
            .inner
            .conditional
            .build_conditional_request(request, entry);

        let mut request_date = Utc::now();
        let mut response = self.inner.backend.execute(conditional).await?;
        let mut response_date = Utc::now();

        // RFC 2616 §13.2.6: a validation response dated earlier than the
        // entry came from a clock-skewed origin; retry once without
        // conditions.
        if revalidation_response_is_too_old(response.headers(), entry) {
            debug!("backend clock precedes the stored entry, retrying unconditionally");
            let unconditional = self.inner.conditional.build_unconditional_request(request);
            request_date = Utc::now();
            response = self.inner.backend.execute(unconditional).await?;
            response_date = Utc::now();
        }

        let (mut parts, body) = response.into_parts();
        parts.headers.append(VIA, via_value(parts.version));

        let status = parts.status;
        if status == StatusCode::NOT_MODIFIED || status == StatusCode::OK {
            self.record_cache_update(ctx);
        }

        if status == StatusCode::NOT_MODIFIED {
            let updated = match self
                .inner
                .store
                .update_cache_entry(request, entry, &parts, request_date, response_date)
                .await
            {
                Ok(updated) => updated,
                Err(error) => {
                    warn!(%error, "could not update cache entry");
                    entry.refreshed(&parts, request_date, response_date)
                }
            };
            let now = Utc::now();
            if self.inner.suitability.is_conditional(request)
                && self
                    .inner
                    .suitability
                    .all_conditionals_match(request, &updated, now)
            {
                return Ok(self.not_modified_response(&updated));
            }
            return Ok(self.inner.generator.generate_response(&updated, now));
        }

        if stale_if_error_applies_to(status)
            && !self.stale_response_not_allowed(request, entry, Utc::now())
            && self
                .inner
                .validity
                .may_return_stale_if_error(request, entry, response_date)
        {
            debug!(status = %status, "salvaging backend error with stale entry");
            let mut response = self.inner.generator.generate_response(entry, Utc::now());
            response.headers_mut().append(WARNING, warning_stale());
            ctx.set_status(CacheResponseStatus::CacheHit);
            return Ok(response);
        }

        self.handle_backend_response(request, parts, body, request_date, response_date)
            .await
    }

    fn handle_revalidation_failure(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
        ctx: &mut CacheContext,
    ) -> CacheResponse<B::Body> {
        if self.stale_response_not_allowed(request, entry, now) {
            ctx.set_status(CacheResponseStatus::CacheModuleResponse);
            return self.synthetic_response(StatusCode::GATEWAY_TIMEOUT, request.version());
        }
        let mut response = self.inner.generator.generate_response(entry, now);
        response
            .headers_mut()
            .append(WARNING, warning_revalidation_failed());
        ctx.set_status(CacheResponseStatus::CacheHit);
        response
    }

    async fn negotiate_response_from_variants(
        &self,
        request: CacheRequest,
        variants: HashMap<String, Variant>,
        ctx: &mut CacheContext,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        let conditional = self
            .inner
            .conditional
            .build_conditional_request_from_variants(&request, &variants);

        let request_date = Utc::now();
        let response = self.inner.backend.execute(clone_request(&conditional)).await?;
        let response_date = Utc::now();

        let (mut parts, body) = response.into_parts();
        parts.headers.append(VIA, via_value(parts.version));

        if parts.status != StatusCode::NOT_MODIFIED {
            return self
                .handle_backend_response(&request, parts, body, request_date, response_date)
                .await;
        }

        let etag = parts
            .headers
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let Some(etag) = etag else {
            warn!("304 response did not contain an ETag");
            return self.call_backend(request).await;
        };
        let Some(variant) = variants.get(&etag) else {
            debug!("304 ETag does not match any variant sent in If-None-Match");
            return self.call_backend(request).await;
        };

        if revalidation_response_is_too_old(&parts.headers, variant.entry()) {
            debug!("variant validation response predates the entry, retrying unconditionally");
            let unconditional = self.inner.conditional.build_unconditional_request(&request);
            return self.call_backend(unconditional).await;
        }

        self.record_cache_update(ctx);

        let updated = match self
            .inner
            .store
            .update_variant_cache_entry(
                &conditional,
                variant.entry(),
                &parts,
                request_date,
                response_date,
                variant.cache_key(),
            )
            .await
        {
            Ok(updated) => updated,
            Err(error) => {
                warn!(%error, "could not update variant cache entry");
                variant.entry().refreshed(&parts, request_date, response_date)
            }
        };

        if let Err(error) = self
            .inner
            .store
            .reuse_variant_entry_for(&request, variant)
            .await
        {
            warn!(%error, "could not update variant map to reuse entry");
        }

        let now = Utc::now();
        if self.inner.suitability.is_conditional(&request)
            && self
                .inner
                .suitability
                .all_conditionals_match(&request, &updated, now)
        {
            return Ok(self.not_modified_response(&updated));
        }
        Ok(self.inner.generator.generate_response(&updated, now))
    }

    async fn call_backend(
        &self,
        request: CacheRequest,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        let request_date = Utc::now();
        debug!("calling the backend");
        let response = self.inner.backend.execute(clone_request(&request)).await?;
        let response_date = Utc::now();

        let (mut parts, body) = response.into_parts();
        parts.headers.append(VIA, via_value(parts.version));
        self.handle_backend_response(&request, parts, body, request_date, response_date)
            .await
    }

    /// Folds a backend response into the store: cacheable responses are
    /// buffered and stored (unless a newer entry exists), uncacheable ones
    /// invalidate whatever the store holds and pass through untouched.
    async fn handle_backend_response(
        &self,
        request: &CacheRequest,
        mut parts: http::response::Parts,
        body: B::Body,
        request_date: DateTime<Utc>,
        response_date: DateTime<Utc>,
    ) -> Result<CacheResponse<B::Body>, CacheError> {
        debug!(status = %parts.status, "handling backend response");
        self.inner
            .response_compliance
            .ensure_protocol_compliance(request, &mut parts)?;

        let cacheable = self
            .inner
            .response_policy
            .is_response_cacheable(request, &parts);

        if cacheable {
            match read_up_to(body, self.inner.config.max_object_size_bytes).await {
                ReadLimit::Complete(bytes) => {
                    if !self.already_have_newer_cache_entry(request, &parts).await {
                        match self
                            .inner
                            .store
                            .cache_and_return_response(
                                request,
                                &parts,
                                bytes.clone(),
                                request_date,
                                response_date,
                            )
                            .await
                        {
                            Ok(entry) => {
                                return Ok(self
                                    .inner
                                    .generator
                                    .generate_response(&entry, Utc::now()));
                            }
                            Err(StorageError::Allocation(error)) => {
                                debug!(%error, "response body refused by resource factory");
                                if let Err(flush_error) =
                                    self.inner.store.flush_cache_entries_for(request).await
                                {
                                    warn!(%flush_error, "unable to flush entry for rejected body");
                                }
                            }
                            Err(error) => warn!(%error, "unable to store entry in cache"),
                        }
                    }
                    return Ok(http::Response::from_parts(parts, CacheBody::full(bytes)));
                }
                ReadLimit::Exceeded(partial) => {
                    debug!(
                        limit = self.inner.config.max_object_size_bytes,
                        "response body exceeds the object size limit, passing through"
                    );
                    if let Err(error) = self.inner.store.flush_cache_entries_for(request).await {
                        warn!(%error, "unable to flush entry for oversized response");
                    }
                    return Ok(http::Response::from_parts(parts, CacheBody::Partial(partial)));
                }
                ReadLimit::Failed(partial) => {
                    return Ok(http::Response::from_parts(parts, CacheBody::Partial(partial)));
                }
            }
        }

        if let Err(error) = self.inner.store.flush_cache_entries_for(request).await {
            warn!(%error, "unable to flush invalid cache entries");
        }
        Ok(http::Response::from_parts(parts, CacheBody::Passthrough(body)))
    }

    async fn already_have_newer_cache_entry(
        &self,
        request: &CacheRequest,
        response: &http::response::Parts,
    ) -> bool {
        let existing = match self.inner.store.get_cache_entry(request).await {
            Ok(Some(existing)) => existing,
            _ => return false,
        };
        let (Some(entry_date), Some(response_date)) = (
            existing.date(),
            response
                .headers
                .get(DATE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_http_date),
        ) else {
            return false;
        };
        response_date < entry_date
    }

    /// Whether serving stale is forbidden: the entry demands revalidation,
    /// the shared cache honors `proxy-revalidate`, or the request made an
    /// explicit freshness demand.
    fn stale_response_not_allowed(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        if self.inner.validity.must_revalidate(entry) {
            return true;
        }
        if self.inner.config.shared_cache && self.inner.validity.proxy_revalidate(entry) {
            return true;
        }
        self.explicit_freshness_request(request, entry, now)
    }

    fn explicit_freshness_request(
        &self,
        request: &CacheRequest,
        entry: &CacheEntry,
        now: DateTime<Utc>,
    ) -> bool {
        for directive in directives(request.headers(), &CACHE_CONTROL) {
            match directive.name() {
                "max-stale" => {
                    if let Some(value) = directive.value() {
                        match delta_seconds(value) {
                            Some(limit) => {
                                if self.inner.validity.staleness_secs(entry, now) > limit {
                                    return true;
                                }
                            }
                            None => return true,
                        }
                    }
                }
                "min-fresh" | "max-age" => return true,
                _ => {}
            }
        }
        false
    }

    fn record_cache_update(&self, ctx: &mut CacheContext) {
        self.inner.updates.fetch_add(1, Ordering::Relaxed);
        ctx.set_status(CacheResponseStatus::Validated);
    }

    /// A `304` generated from a stored entry, stamped with this cache's
    /// `Via` (the §10.3.5 header subset does not carry the stored one).
    fn not_modified_response(&self, entry: &CacheEntry) -> CacheResponse<B::Body> {
        let mut response = self.inner.generator.generate_not_modified_response(entry);
        response
            .headers_mut()
            .append(VIA, via_value(entry.version()));
        response
    }

    fn synthetic_response(&self, status: StatusCode, version: Version) -> CacheResponse<B::Body> {
        http::Response::builder()
            .status(status)
            .header(CONTENT_LENGTH, HeaderValue::from_static("0"))
            .header(VIA, via_value(version))
            .body(CacheBody::empty())
            .expect("synthesized response")
    }
}

/// `OPTIONS * HTTP/1.x` with `Max-Forwards: 0` addresses this cache
/// itself. A missing `Max-Forwards` header means the request is not ours.
fn is_self_addressed_options(request: &CacheRequest) -> bool {
    request.method() == Method::OPTIONS
        && request.uri() == "*"
        && request
            .headers()
            .get(MAX_FORWARDS)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            == Some("0")
}

fn may_call_backend(request: &CacheRequest) -> bool {
    !has_directive(request.headers(), &CACHE_CONTROL, "only-if-cached")
}

fn stale_if_error_applies_to(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

/// A validation response whose `Date` precedes the entry's came from a
/// clock that ran behind the one that produced the entry. Unparseable
/// dates on either side mean the ordering is unknown; no retry then.
fn revalidation_response_is_too_old(headers: &HeaderMap, entry: &CacheEntry) -> bool {
    let (Some(entry_date), Some(response_date)) = (
        entry.date(),
        headers
            .get(DATE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_http_date),
    ) else {
        return false;
    };
    response_date < entry_date
}

fn via_value(version: Version) -> HeaderValue {
    let product = concat!("cachet/", env!("CARGO_PKG_VERSION"));
    let proto = if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_2 {
        "2.0"
    } else if version == Version::HTTP_3 {
        "3.0"
    } else {
        "1.1"
    };
    HeaderValue::from_str(&format!("{proto} {VIA_PSEUDONYM} ({product} (cache))"))
        .unwrap_or_else(|_| HeaderValue::from_static(VIA_PSEUDONYM))
}
