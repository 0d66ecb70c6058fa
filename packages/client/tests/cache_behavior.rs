mod common;

use std::sync::Arc;
use std::time::Duration;

use http::header::{
    ACCEPT_LANGUAGE, AGE, CACHE_CONTROL, CONTENT_LOCATION, IF_NONE_MATCH, LOCATION, PRAGMA, VARY,
    WARNING,
};
use http::{HeaderValue, Method, StatusCode};
use revcache_client::prelude::*;

use common::*;

fn cache(transport: &Arc<Scripted>, clock: &ManualClock) -> CachingTransport<Arc<Scripted>> {
    CacheBuilder::new()
        .clock(clock.clone())
        .build(Arc::clone(transport))
}

#[tokio::test]
async fn fresh_entry_is_served_without_origin_contact() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = cache(&origin, &clock);

    let first = cache.execute(get("/r")).await.unwrap();
    assert_eq!(first.body().as_ref(), b"v1 body");

    clock.advance(Duration::from_secs(30));
    let second = cache.execute(get("/r")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.body().as_ref(), b"v1 body");
    assert_eq!(second.headers()[AGE], "30");
    assert_eq!(origin.calls(), 1);

    let stats = cache.stats().snapshot();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.stores, 1);
}

#[tokio::test]
async fn stale_entry_is_revalidated_and_304_merged() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push(not_modified(&clock, "\"v1\""));
    let revalidated = cache.execute(get("/r")).await.unwrap();

    assert_eq!(origin.calls(), 2);
    assert_eq!(origin.request(1).headers()[IF_NONE_MATCH], "\"v1\"");
    assert_eq!(revalidated.status(), StatusCode::OK);
    assert_eq!(revalidated.body().as_ref(), b"v1 body");

    // the merged entry is fresh again
    clock.advance(Duration::from_secs(10));
    let hit = cache.execute(get("/r")).await.unwrap();
    assert_eq!(hit.body().as_ref(), b"v1 body");
    assert_eq!(origin.calls(), 2);

    let stats = cache.stats().snapshot();
    assert_eq!(stats.revalidations, 1);
    assert_eq!(stats.not_modified, 1);
}

#[tokio::test]
async fn stale_entry_without_validators_is_refetched() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "old", "max-age=60"));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push(ok(&clock, "new", "max-age=60"));
    let response = cache.execute(get("/r")).await.unwrap();

    assert_eq!(response.body().as_ref(), b"new");
    assert!(!origin.request(1).headers().contains_key(IF_NONE_MATCH));
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn unsafe_method_invalidates_the_resource() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "before", "max-age=600"));
    origin.push(HttpResponse::empty(StatusCode::NO_CONTENT));
    origin.push(ok(&clock, "after", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    cache
        .execute(request(Method::POST, "/r").with_body("update"))
        .await
        .unwrap();
    let response = cache.execute(get("/r")).await.unwrap();

    assert_eq!(response.body().as_ref(), b"after");
    assert_eq!(origin.calls(), 3);
    assert!(cache.stats().snapshot().invalidations >= 1);
}

#[tokio::test]
async fn location_targets_are_invalidated() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "item", "max-age=600"));
    origin.push(ok(&clock, "listing", "max-age=600"));
    origin.push(
        HttpResponse::empty(StatusCode::CREATED)
            .with_header(LOCATION, HeaderValue::from_static("/items/1"))
            .with_header(CONTENT_LOCATION, HeaderValue::from_static("/items")),
    );
    origin.push(ok(&clock, "item v2", "max-age=600"));
    origin.push(ok(&clock, "listing v2", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/items/1")).await.unwrap();
    cache.execute(get("/items")).await.unwrap();
    cache
        .execute(request(Method::POST, "/items/new").with_body("{}"))
        .await
        .unwrap();

    assert_eq!(cache.execute(get("/items/1")).await.unwrap().body().as_ref(), b"item v2");
    assert_eq!(cache.execute(get("/items")).await.unwrap().body().as_ref(), b"listing v2");
    assert_eq!(origin.calls(), 5);
}

#[tokio::test]
async fn cross_origin_location_is_left_alone() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "kept", "max-age=600"));
    origin.push(
        HttpResponse::empty(StatusCode::CREATED)
            .with_header(LOCATION, HeaderValue::from_static("http://other.example/r")),
    );
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    cache.execute(request(Method::PUT, "/elsewhere")).await.unwrap();

    assert_eq!(cache.execute(get("/r")).await.unwrap().body().as_ref(), b"kept");
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn failed_unsafe_request_still_invalidates_beforehand() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "before", "max-age=600"));
    origin.push(HttpResponse::empty(StatusCode::INTERNAL_SERVER_ERROR));
    origin.push(ok(&clock, "after", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    let failed = cache.execute(request(Method::DELETE, "/r")).await.unwrap();
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(cache.execute(get("/r")).await.unwrap().body().as_ref(), b"after");
}

#[tokio::test]
async fn no_store_responses_are_never_stored() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "one", "no-store, max-age=600"));
    origin.push(ok(&clock, "two", "no-store, max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    let second = cache.execute(get("/r")).await.unwrap();

    assert_eq!(second.body().as_ref(), b"two");
    assert_eq!(origin.calls(), 2);
    assert_eq!(cache.stats().snapshot().stores, 0);
}

#[tokio::test]
async fn request_no_store_bypasses_the_cache() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "cached", "max-age=600"));
    origin.push(ok(&clock, "direct", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    let direct = cache
        .execute(get("/r").header(CACHE_CONTROL, HeaderValue::from_static("no-store")))
        .await
        .unwrap();
    assert_eq!(direct.body().as_ref(), b"direct");

    // the bypassing request left the stored entry untouched
    assert_eq!(cache.execute(get("/r")).await.unwrap().body().as_ref(), b"cached");
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn vary_selects_between_variants() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "hello", "max-age=600").with_header(VARY, HeaderValue::from_static("Accept-Language")));
    origin.push(ok(&clock, "bonjour", "max-age=600").with_header(VARY, HeaderValue::from_static("Accept-Language")));
    let cache = cache(&origin, &clock);

    let english = || get("/greeting").header(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
    let french = || get("/greeting").header(ACCEPT_LANGUAGE, HeaderValue::from_static("fr"));

    assert_eq!(cache.execute(english()).await.unwrap().body().as_ref(), b"hello");
    assert_eq!(cache.execute(french()).await.unwrap().body().as_ref(), b"bonjour");
    assert_eq!(cache.execute(english()).await.unwrap().body().as_ref(), b"hello");
    assert_eq!(cache.execute(french()).await.unwrap().body().as_ref(), b"bonjour");
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn vary_star_is_not_stored() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "one", "max-age=600").with_header(VARY, HeaderValue::from_static("*")));
    origin.push(ok(&clock, "two", "max-age=600").with_header(VARY, HeaderValue::from_static("*")));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    cache.execute(get("/r")).await.unwrap();
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn stale_if_error_serves_stale_with_warning() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = CacheBuilder::new()
        .clock(clock.clone())
        .stale_if_error(true)
        .build(Arc::clone(&origin));
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push_err(revcache_client::error::connect("connection refused"));
    let response = cache.execute(get("/r")).await.unwrap();

    assert_eq!(response.body().as_ref(), b"v1 body");
    assert!(response.headers()[WARNING].to_str().unwrap().starts_with("111"));
    assert_eq!(response.headers()[AGE], "61");
    assert_eq!(cache.stats().snapshot().stale_served, 1);
}

#[tokio::test]
async fn transport_errors_propagate_without_stale_if_error() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push_err(revcache_client::error::connect("connection refused"));
    let err = cache.execute(get("/r")).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn must_revalidate_blocks_stale_if_error() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60, must-revalidate"), "\"v1\""));
    let cache = CacheBuilder::new()
        .clock(clock.clone())
        .stale_if_error(true)
        .build(Arc::clone(&origin));
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push_err(revcache_client::error::connect("connection refused"));
    assert!(cache.execute(get("/r")).await.is_err());
}

#[tokio::test]
async fn error_statuses_are_not_masked_by_stale_if_error() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = CacheBuilder::new()
        .clock(clock.clone())
        .stale_if_error(true)
        .build(Arc::clone(&origin));
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push(HttpResponse::empty(StatusCode::SERVICE_UNAVAILABLE));
    let response = cache.execute(get("/r")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn max_stale_serves_stale_with_warning() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "old", "max-age=60"));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(70));
    let response = cache
        .execute(get("/r").header(CACHE_CONTROL, HeaderValue::from_static("max-stale=30")))
        .await
        .unwrap();

    assert_eq!(response.body().as_ref(), b"old");
    assert!(response.headers()[WARNING].to_str().unwrap().starts_with("110"));
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn pragma_no_cache_forces_revalidation() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=600"), "\"v1\""));
    origin.push(not_modified(&clock, "\"v1\""));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    let response = cache
        .execute(get("/r").header(PRAGMA, HeaderValue::from_static("no-cache")))
        .await
        .unwrap();
    assert_eq!(response.body().as_ref(), b"v1 body");
    assert_eq!(origin.calls(), 2);
    assert_eq!(origin.request(1).headers()[IF_NONE_MATCH], "\"v1\"");
}

#[tokio::test]
async fn only_if_cached_miss_is_gateway_timeout() {
    let clock = clock();
    let origin = Scripted::new();
    let cache = cache(&origin, &clock);

    let response = cache
        .execute(get("/r").header(CACHE_CONTROL, HeaderValue::from_static("only-if-cached")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(origin.calls(), 0);
}

#[tokio::test]
async fn only_if_cached_serves_fresh_entry() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "cached", "max-age=600"));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    let response = cache
        .execute(get("/r").header(CACHE_CONTROL, HeaderValue::from_static("only-if-cached")))
        .await
        .unwrap();
    assert_eq!(response.body().as_ref(), b"cached");
    assert_eq!(origin.calls(), 1);
}

#[tokio::test]
async fn options_passes_straight_through() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "cached", "max-age=600"));
    origin.push(ok(&clock, "", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    cache.execute(request(Method::OPTIONS, "/r")).await.unwrap();
    assert_eq!(cache.execute(get("/r")).await.unwrap().body().as_ref(), b"cached");

    assert_eq!(origin.calls(), 2);
    assert_eq!(cache.stats().snapshot().invalidations, 0);
}

#[tokio::test]
async fn caller_conditionals_skip_lookup() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=600"), "\"v1\""));
    origin.push(not_modified(&clock, "\"v1\""));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    let response = cache
        .execute(get("/r").header(IF_NONE_MATCH, HeaderValue::from_static("\"v1\"")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(origin.calls(), 2);
}

#[tokio::test]
async fn mismatched_304_triggers_one_full_retry() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = cache(&origin, &clock);
    cache.execute(get("/r")).await.unwrap();

    clock.advance(Duration::from_secs(61));
    origin.push(not_modified(&clock, "\"v2\""));
    origin.push(with_etag(ok(&clock, "v2 body", "max-age=60"), "\"v2\""));
    let response = cache.execute(get("/r")).await.unwrap();

    assert_eq!(response.body().as_ref(), b"v2 body");
    assert_eq!(origin.calls(), 3);
    assert!(!origin.request(2).headers().contains_key(IF_NONE_MATCH));

    // the refetched response replaced the old entry
    assert_eq!(cache.execute(get("/r")).await.unwrap().body().as_ref(), b"v2 body");
    assert_eq!(origin.calls(), 3);
}

#[tokio::test]
async fn head_and_get_are_cached_separately() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "body", "max-age=600"));
    origin.push(ok(&clock, "", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/r")).await.unwrap();
    cache.execute(request(Method::HEAD, "/r")).await.unwrap();
    cache.execute(request(Method::HEAD, "/r")).await.unwrap();
    assert_eq!(origin.calls(), 2);
    assert_eq!(*origin.request(1).method(), Method::HEAD);
}

#[tokio::test]
async fn revalidation_scenario_with_undated_304() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(with_etag(ok(&clock, "v1 body", "max-age=60"), "\"v1\""));
    let cache = cache(&origin, &clock);

    cache.execute(get("/resource")).await.unwrap();
    let second = cache.execute(get("/resource")).await.unwrap();
    assert_eq!(second.body().as_ref(), b"v1 body");
    assert_eq!(origin.calls(), 1);

    clock.advance(Duration::from_secs(61));
    origin.push(
        HttpResponse::empty(StatusCode::NOT_MODIFIED)
            .with_header(CACHE_CONTROL, HeaderValue::from_static("max-age=60")),
    );
    let third = cache.execute(get("/resource")).await.unwrap();
    assert_eq!(origin.calls(), 2);
    assert_eq!(origin.request(1).headers()[IF_NONE_MATCH], "\"v1\"");
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(third.body().as_ref(), b"v1 body");
    assert_eq!(third.headers()[AGE], "0");

    clock.advance(Duration::from_secs(1));
    let fourth = cache.execute(get("/resource")).await.unwrap();
    assert_eq!(fourth.headers()[AGE], "1");
    assert_eq!(origin.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_revalidation_leaves_the_store_untouched() {
    let clock = clock();
    let origin = Scripted::delayed(Duration::from_millis(100));
    origin.push(with_etag(
        ok(&clock, "v1 body", "max-age=60").with_header(VARY, HeaderValue::from_static("Accept-Language")),
        "\"v1\"",
    ));
    let cache = Arc::new(cache(&origin, &clock));
    cache
        .execute(get("/r").header(ACCEPT_LANGUAGE, HeaderValue::from_static("en")))
        .await
        .unwrap();
    let stored_before = cache.stats().snapshot().stores;

    clock.advance(Duration::from_secs(61));
    origin.push(with_etag(
        ok(&clock, "v2 body", "max-age=60").with_header(VARY, HeaderValue::from_static("Accept-Language")),
        "\"v2\"",
    ));
    let pending = tokio::spawn({
        let cache = Arc::clone(&cache);
        async move {
            cache
                .execute(get("/r").header(ACCEPT_LANGUAGE, HeaderValue::from_static("en")))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(origin.calls(), 2);
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let base = CacheKey::new(&Method::GET, &url("/r"));
    let entry = cache.store().get(&base).await.unwrap().unwrap();
    assert_eq!(entry.body().as_ref(), b"v1 body");
    assert_eq!(entry.etag(), Some("\"v1\""));

    let mut english = http::HeaderMap::new();
    english.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
    let variant = base.with_vary(&[ACCEPT_LANGUAGE], &english);
    let variant_entry = cache.store().get(&variant).await.unwrap().unwrap();
    assert_eq!(variant_entry.body().as_ref(), b"v1 body");
    assert_eq!(cache.stats().snapshot().stores, stored_before);
    assert_eq!(cache.stats().snapshot().revalidations, 1);
}

#[tokio::test]
async fn streamed_request_bodies_pass_through_the_cache() {
    let clock = clock();
    let origin = Scripted::new();
    origin.push(ok(&clock, "v1", "max-age=600"));
    origin.push(HttpResponse::empty(StatusCode::NO_CONTENT));
    origin.push(ok(&clock, "v2", "max-age=600"));
    let cache = cache(&origin, &clock);

    cache.execute(get("/upload")).await.unwrap();
    let chunks: BodyStream = Box::pin(futures::stream::iter(vec![
        Ok(bytes::Bytes::from_static(b"part one ")),
        Ok(bytes::Bytes::from_static(b"part two")),
    ]));
    let upload = request(Method::PUT, "/upload").with_body(RequestBody::Streamed {
        stream: chunks,
        content_length: None,
    });
    cache.execute(upload).await.unwrap();

    assert_eq!(cache.execute(get("/upload")).await.unwrap().body().as_ref(), b"v2");
    assert_eq!(origin.calls(), 3);
}
