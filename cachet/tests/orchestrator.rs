//! End-to-end orchestrator behavior against the in-memory store.

mod common;

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http::header::{AGE, VIA, WARNING};
use http::StatusCode;
use http_body::Body as _;
use http_body_util::BodyExt;

use cachet::{CacheConfig, CacheContext, CacheOrchestrator, CacheResponseStatus};
use cachet_core::date::format_http_date;
use cachet_core::{CacheError, CacheRequest, CacheResponse};
use cachet_memory::MemoryCacheStore;

use common::{MockBackend, ScriptedResponse, TestBody};

fn orchestrator(
    backend: &MockBackend,
    config: CacheConfig,
) -> CacheOrchestrator<MockBackend, MemoryCacheStore> {
    CacheOrchestrator::builder()
        .backend(backend.clone())
        .store(MemoryCacheStore::new())
        .config(config)
        .build()
}

fn get(uri: &str) -> CacheRequest {
    http::Request::builder()
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn get_with(uri: &str, headers: &[(&str, &str)]) -> CacheRequest {
    let mut builder = http::Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Bytes::new()).unwrap()
}

fn http_date_secs_ago(secs: i64) -> String {
    format_http_date(Utc::now() - chrono::Duration::seconds(secs))
}

async fn body_bytes(response: CacheResponse<TestBody>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn via_count(response: &CacheResponse<TestBody>) -> usize {
    response.headers().get_all(VIA).iter().count()
}

fn age_secs(response: &CacheResponse<TestBody>) -> i64 {
    response
        .headers()
        .get(AGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("response carries an Age header")
}

fn has_warning(response: &CacheResponse<TestBody>, code: &str) -> bool {
    response
        .headers()
        .get_all(WARNING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(code))
}

#[tokio::test]
async fn cold_miss_then_hit() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(10))
            .header("cache-control", "max-age=60")
            .body("A"),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheMiss));
    assert_eq!(via_count(&response), 1);
    assert_eq!(body_bytes(response).await.as_ref(), b"A");

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
    assert_eq!(via_count(&response), 1);
    let age = age_secs(&response);
    assert!((10..=12).contains(&age), "age was {age}");
    assert_eq!(body_bytes(response).await.as_ref(), b"A");

    // The backend saw exactly the first request.
    assert_eq!(backend.request_count(), 1);
    assert_eq!(cache.cache_misses(), 1);
    assert_eq!(cache.cache_hits(), 1);
}

#[tokio::test]
async fn revalidation_with_304_refreshes_entry() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(120))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\"")
            .body("A"),
    );
    backend.push(
        ScriptedResponse::new(304)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\""),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();

    // Entry is stale: the second call revalidates conditionally.
    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::Validated));
    assert_eq!(body_bytes(response).await.as_ref(), b"A");

    let conditional = backend.request(1);
    assert_eq!(
        conditional.headers().get("if-none-match").unwrap(),
        "\"v1\""
    );
    assert_eq!(cache.cache_updates(), 1);

    // Refreshed by the 304: the third call is a plain hit.
    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
    assert_eq!(body_bytes(response).await.as_ref(), b"A");
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn clock_skew_triggers_unconditional_retry() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(120))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\"")
            .body("A"),
    );
    // Validation response dated before the entry: clock skew.
    backend.push(
        ScriptedResponse::new(304)
            .header("date", &http_date_secs_ago(500))
            .header("etag", "\"v1\""),
    );
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .body("B"),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/a"), &mut ctx).await.unwrap();
    assert_eq!(body_bytes(response).await.as_ref(), b"B");

    // Three exchanges: seed, conditional probe, unconditional retry.
    assert_eq!(backend.request_count(), 3);
    let retry = backend.request(2);
    assert!(retry.headers().get("if-none-match").is_none());
    assert!(retry.headers().get("if-modified-since").is_none());
    assert_eq!(retry.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(retry.headers().get("pragma").unwrap(), "no-cache");
}

#[tokio::test]
async fn variant_negotiation_serves_matched_variant() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .header("vary", "Accept-Language")
            .header("etag", "\"e1\"")
            .body("english"),
    );
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .header("vary", "Accept-Language")
            .header("etag", "\"f1\"")
            .body("french"),
    );
    // The origin answers the negotiation probe: the "f1" variant matches.
    backend.push(
        ScriptedResponse::new(304)
            .header("date", &http_date_secs_ago(0))
            .header("etag", "\"f1\""),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache
        .execute(
            get_with("http://example.com/v", &[("accept-language", "en")]),
            &mut ctx,
        )
        .await
        .unwrap();

    let mut ctx = CacheContext::new();
    cache
        .execute(
            get_with("http://example.com/v", &[("accept-language", "fr")]),
            &mut ctx,
        )
        .await
        .unwrap();
    // Second fetch negotiated against the known variant set.
    let probe = backend.request(1);
    assert_eq!(probe.headers().get("if-none-match").unwrap(), "\"e1\"");

    let mut ctx = CacheContext::new();
    let response = cache
        .execute(
            get_with("http://example.com/v", &[("accept-language", "de")]),
            &mut ctx,
        )
        .await
        .unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::Validated));
    assert_eq!(body_bytes(response).await.as_ref(), b"french");

    let probe = backend.request(2);
    assert_eq!(
        probe.headers().get("if-none-match").unwrap(),
        "\"e1\", \"f1\""
    );
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn only_if_cached_miss_returns_504_without_backend() {
    let backend = MockBackend::new();
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    let response = cache
        .execute(
            get_with("http://example.com/b", &[("cache-control", "only-if-cached")]),
            &mut ctx,
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheModuleResponse));
    assert_eq!(via_count(&response), 1);
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn stale_if_error_salvages_5xx() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(30))
            .header("cache-control", "max-age=0, stale-if-error=60")
            .header("etag", "\"v1\"")
            .body("C"),
    );
    backend.push(ScriptedResponse::new(503).header("date", &http_date_secs_ago(0)));
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/c"), &mut ctx).await.unwrap();

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/c"), &mut ctx).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(has_warning(&response, "110"));
    assert_eq!(body_bytes(response).await.as_ref(), b"C");
}

#[tokio::test]
async fn stale_while_revalidate_is_single_flight() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=0, stale-while-revalidate=60")
            .header("etag", "\"v1\"")
            .body("D"),
    );
    // Exactly one background revalidation may reach the backend.
    backend.push(
        ScriptedResponse::new(304)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\"")
            .delay(Duration::from_millis(100)),
    );
    let cache = orchestrator(
        &backend,
        CacheConfig::builder().asynchronous_workers_max(2).build(),
    );

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/d"), &mut ctx).await.unwrap();

    // Two stale serves in quick succession while the refresh is running.
    for _ in 0..2 {
        let mut ctx = CacheContext::new();
        let response = cache.execute(get("http://example.com/d"), &mut ctx).await.unwrap();
        assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
        assert!(has_warning(&response, "110"));
        assert_eq!(body_bytes(response).await.as_ref(), b"D");
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    // Seed plus a single background revalidation.
    assert_eq!(backend.request_count(), 2);

    // The refreshed entry now serves fresh without warnings.
    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/d"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
    assert!(!has_warning(&response, "110"));
    assert_eq!(body_bytes(response).await.as_ref(), b"D");
}

#[tokio::test]
async fn revalidation_transport_failure_serves_stale_with_warning_111() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(120))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\"")
            .body("E"),
    );
    backend.push(ScriptedResponse::error());
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/e"), &mut ctx).await.unwrap();

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/e"), &mut ctx).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
    assert!(has_warning(&response, "111"));
    assert_eq!(body_bytes(response).await.as_ref(), b"E");
}

#[tokio::test]
async fn revalidation_failure_with_must_revalidate_returns_504() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(120))
            .header("cache-control", "max-age=60, must-revalidate")
            .header("etag", "\"v1\"")
            .body("F"),
    );
    backend.push(ScriptedResponse::error());
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/f"), &mut ctx).await.unwrap();

    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/f"), &mut ctx).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheModuleResponse));
}

#[tokio::test]
async fn transport_error_on_miss_propagates() {
    let backend = MockBackend::new();
    backend.push(ScriptedResponse::error());
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    let result = cache.execute(get("http://example.com/g"), &mut ctx).await;
    assert!(matches!(result, Err(CacheError::Transport(_))));
}

#[tokio::test]
async fn unsafe_method_invalidates_entry() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .body("before"),
    );
    backend.push(ScriptedResponse::new(200).header("date", &http_date_secs_ago(0)));
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .body("after"),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/h"), &mut ctx).await.unwrap();

    let post = http::Request::builder()
        .method("POST")
        .uri("http://example.com/h")
        .body(Bytes::new())
        .unwrap();
    let mut ctx = CacheContext::new();
    cache.execute(post, &mut ctx).await.unwrap();

    // The entry was invalidated: the next read goes to the backend.
    let mut ctx = CacheContext::new();
    let response = cache.execute(get("http://example.com/h"), &mut ctx).await.unwrap();
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheMiss));
    assert_eq!(body_bytes(response).await.as_ref(), b"after");
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn shared_cache_never_stores_private_responses() {
    let backend = MockBackend::new();
    for _ in 0..2 {
        backend.push(
            ScriptedResponse::new(200)
                .header("date", &http_date_secs_ago(0))
                .header("cache-control", "private, max-age=60")
                .body("secret"),
        );
    }
    let cache = orchestrator(&backend, CacheConfig::default());

    for _ in 0..2 {
        let mut ctx = CacheContext::new();
        let response = cache.execute(get("http://example.com/p"), &mut ctx).await.unwrap();
        assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheMiss));
        assert_eq!(body_bytes(response).await.as_ref(), b"secret");
    }
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn oversized_body_passes_through_uncached() {
    let backend = MockBackend::new();
    for _ in 0..2 {
        backend.push(
            ScriptedResponse::new(200)
                .header("date", &http_date_secs_ago(0))
                .header("cache-control", "max-age=60")
                .body("this body does not fit in the configured limit"),
        );
    }
    let cache = orchestrator(
        &backend,
        CacheConfig::builder().max_object_size_bytes(8).build(),
    );

    for _ in 0..2 {
        let mut ctx = CacheContext::new();
        let response = cache.execute(get("http://example.com/big"), &mut ctx).await.unwrap();
        assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheMiss));
        // The caller still observes the complete body.
        assert_eq!(
            body_bytes(response).await.as_ref(),
            b"this body does not fit in the configured limit"
        );
    }
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn self_addressed_options_is_answered_by_the_cache() {
    let backend = MockBackend::new();
    let cache = orchestrator(&backend, CacheConfig::default());

    let request = http::Request::builder()
        .method("OPTIONS")
        .uri("*")
        .header("max-forwards", "0")
        .body(Bytes::new())
        .unwrap();
    let mut ctx = CacheContext::new();
    let response = cache.execute(request, &mut ctx).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheModuleResponse));
    assert_eq!(via_count(&response), 1);
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn fatally_noncompliant_request_gets_synthesized_error() {
    let backend = MockBackend::new();
    let cache = orchestrator(&backend, CacheConfig::default());

    let request = http::Request::builder()
        .method("PUT")
        .uri("http://example.com/a")
        .header("if-match", "W/\"v1\"")
        .body(Bytes::new())
        .unwrap();
    let mut ctx = CacheContext::new();
    let response = cache.execute(request, &mut ctx).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheModuleResponse));
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn conditional_request_against_fresh_entry_gets_304() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .header("etag", "\"v1\"")
            .body("G"),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    cache.execute(get("http://example.com/i"), &mut ctx).await.unwrap();

    let mut ctx = CacheContext::new();
    let response = cache
        .execute(
            get_with("http://example.com/i", &[("if-none-match", "\"v1\"")]),
            &mut ctx,
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
    assert_eq!(via_count(&response), 1);
    assert!(response.body().is_end_stream());
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn hit_body_is_byte_identical_across_serves() {
    let backend = MockBackend::new();
    backend.push(
        ScriptedResponse::new(200)
            .header("date", &http_date_secs_ago(0))
            .header("cache-control", "max-age=60")
            .body("exact payload bytes"),
    );
    let cache = orchestrator(&backend, CacheConfig::default());

    let mut ctx = CacheContext::new();
    let first = cache.execute(get("http://example.com/j"), &mut ctx).await.unwrap();
    let first = body_bytes(first).await;

    for _ in 0..3 {
        let mut ctx = CacheContext::new();
        let response = cache.execute(get("http://example.com/j"), &mut ctx).await.unwrap();
        assert_eq!(ctx.status(), Some(CacheResponseStatus::CacheHit));
        assert_eq!(body_bytes(response).await, first);
    }
}
