//! Dispatcher behaviour against a scripted transport.

mod support;

use bridge_traits::device::{DeviceProfile, DisplayClass};
use bytes::Bytes;
use core_cache::ResponseSnapshot;
use core_request::{
    Dispatcher, Reply, RequestDescriptor, RequestError, RequestFlags, TransportError,
    TransportKind,
};
use core_runtime::ByteBudget;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use support::{config, manual_clock, ScriptedTransport};
use tokio_util::sync::CancellationToken;

const URL: &str = "https://api.example.com/catalog";

fn ok(body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(200, URL, body.to_string()).with_status_text("OK")
}

fn dispatcher(transport: &Arc<ScriptedTransport>) -> Dispatcher {
    Dispatcher::with_transport(config(manual_clock()), transport.clone())
}

#[tokio::test]
async fn fresh_cache_hit_skips_the_network() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("first")));
    let dispatcher = dispatcher(&transport);

    let first = dispatcher.get(URL).await.unwrap();
    assert!(!first.from_cache);

    let second = dispatcher.get(URL).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.text(), "first");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn cache_can_be_bypassed_per_request() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("one")));
    transport.push(Ok(ok("two")));
    let dispatcher = dispatcher(&transport);

    dispatcher.get(URL).await.unwrap();
    let reply = dispatcher
        .request(URL, RequestFlags::new().cache(false))
        .await
        .unwrap();
    assert_eq!(reply.into_bytes(), Bytes::from_static(b"two"));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn not_modified_serves_cached_body_with_validators_sent() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("v1")
        .with_header("ETag", "\"v1\"")
        .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")));
    transport.push(Err(TransportError::status(
        304,
        ResponseSnapshot::new(304, URL, Bytes::new()),
    )));
    let dispatcher = dispatcher(&transport);

    dispatcher.get(URL).await.unwrap();
    let revalidated = dispatcher.get(URL).await.unwrap();

    assert_eq!(revalidated.status, 200);
    assert_eq!(revalidated.text(), "v1");
    assert!(revalidated.from_cache);
    assert_eq!(transport.calls(), 2);

    let sent = transport.last_request();
    assert_eq!(sent.headers.get("If-None-Match").map(String::as_str), Some("\"v1\""));
    assert_eq!(
        sent.headers.get("If-Modified-Since").map(String::as_str),
        Some("Wed, 21 Oct 2015 07:28:00 GMT")
    );

    let stats = dispatcher.cache_stats().await.unwrap().unwrap();
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn not_modified_does_not_restart_entry_lifetime() {
    let clock = manual_clock();
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("v1")
        .with_header("ETag", "\"v1\"")
        .with_header("Cache-Control", "max-age=10")));
    transport.push(Err(TransportError::status(
        304,
        ResponseSnapshot::new(304, URL, Bytes::new()),
    )));
    transport.push(Ok(ok("v1 refetched")));
    let dispatcher = Dispatcher::with_transport(config(clock.clone()), transport.clone());

    dispatcher.get(URL).await.unwrap();

    clock.advance(Duration::from_secs(8));
    let revalidated = dispatcher.get(URL).await.unwrap();
    assert!(revalidated.from_cache);
    assert!(transport.last_request().headers.contains_key("If-None-Match"));

    // 13 s after the original save: expired unless the 304 re-stored it
    clock.advance(Duration::from_secs(5));
    let refetched = dispatcher.get(URL).await.unwrap();
    assert!(!refetched.from_cache);
    assert_eq!(refetched.text(), "v1 refetched");
    assert!(!transport.last_request().headers.contains_key("If-None-Match"));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn changed_resource_replaces_cached_entry() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("v1").with_header("ETag", "\"v1\"")));
    transport.push(Ok(ok("v2").with_header("ETag", "\"v2\"")));
    transport.push(Err(TransportError::status(
        304,
        ResponseSnapshot::new(304, URL, Bytes::new()),
    )));
    let dispatcher = dispatcher(&transport);

    dispatcher.get(URL).await.unwrap();
    assert_eq!(dispatcher.get(URL).await.unwrap().text(), "v2");
    assert_eq!(dispatcher.get(URL).await.unwrap().text(), "v2");
    assert_eq!(
        transport.last_request().headers.get("If-None-Match").map(String::as_str),
        Some("\"v2\"")
    );
}

#[tokio::test]
async fn post_requests_are_not_cached() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("created")));
    transport.push(Ok(ok("created again")));
    let dispatcher = dispatcher(&transport);

    for _ in 0..2 {
        dispatcher
            .request(RequestDescriptor::post(URL), RequestFlags::new())
            .await
            .unwrap();
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn direct_requests_return_raw_bytes() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("raw")));
    let dispatcher = dispatcher(&transport);

    let reply = dispatcher
        .request(URL, RequestFlags::new().direct())
        .await
        .unwrap();
    assert_eq!(reply, Reply::Bytes(Bytes::from_static(b"raw")));
}

#[tokio::test]
async fn compressed_responses_are_inflated() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    let packed = core_codec::gzip(b"{\"name\":\"catalog\"}").unwrap();
    transport.push(Ok(ResponseSnapshot::new(200, URL, packed).with_compressed(true)));
    let dispatcher = dispatcher(&transport);

    #[derive(Deserialize)]
    struct Catalog {
        name: String,
    }
    let catalog: Catalog = dispatcher.get_json(URL).await.unwrap();
    assert_eq!(catalog.name, "catalog");

    // served again from the cache, still inflated
    let cached: Catalog = dispatcher.get_json(URL).await.unwrap();
    assert_eq!(cached.name, "catalog");
}

#[tokio::test]
async fn http_errors_carry_status_and_body() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Err(TransportError::status(
        503,
        ResponseSnapshot::new(503, URL, "down").with_status_text("Service Unavailable"),
    )));
    let dispatcher = dispatcher(&transport);

    match dispatcher.get(URL).await {
        Err(RequestError::HttpStatus {
            status,
            status_text,
            body,
        }) => {
            assert_eq!(status, 503);
            assert_eq!(status_text, "Service Unavailable");
            assert_eq!(body, Bytes::from_static(b"down"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_signal_is_retried_once() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Err(TransportError::Retry("busy".to_string())));
    transport.push(Ok(ok("second try")));
    let dispatcher = dispatcher(&transport);

    let response = dispatcher.get(URL).await.unwrap();
    assert_eq!(response.text(), "second try");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn persistent_retry_signal_surfaces_as_retryable() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Err(TransportError::Retry("busy".to_string())));
    transport.push(Err(TransportError::Retry("still busy".to_string())));
    let dispatcher = dispatcher(&transport);

    let err = dispatcher.get(URL).await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_requests_time_out_and_release_their_slot() {
    let transport = Arc::new(
        ScriptedTransport::new(TransportKind::Network).with_delay(Duration::from_secs(30)),
    );
    transport.push(Ok(ok("too late")));
    let dispatcher = dispatcher(&transport);

    let err = dispatcher
        .request(
            RequestDescriptor::get(URL).timeout(Duration::from_secs(2)),
            RequestFlags::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RequestError::Timeout { after } if after == Duration::from_secs(2)));
    assert_eq!(dispatcher.lanes().normal.in_use(), 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_covers_slot_wait() {
    let transport = Arc::new(
        ScriptedTransport::new(TransportKind::Network).with_delay(Duration::from_secs(1)),
    );
    let dispatcher = dispatcher(&transport);

    let held: Vec<_> = (0..dispatcher.lanes().normal.size())
        .map(|_| dispatcher.lanes().normal.try_acquire().unwrap())
        .collect();

    let err = dispatcher
        .request(
            RequestDescriptor::get(URL).timeout(Duration::from_millis(500)),
            RequestFlags::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Timeout { .. }));
    assert_eq!(transport.calls(), 0);

    drop(held);
    assert_eq!(dispatcher.lanes().normal.available(), dispatcher.lanes().normal.size());
}

#[tokio::test(start_paused = true)]
async fn abort_token_cancels_in_flight_request() {
    let transport = Arc::new(
        ScriptedTransport::new(TransportKind::Network).with_delay(Duration::from_secs(3)),
    );
    transport.push(Ok(ok("never seen")));
    let dispatcher = Arc::new(dispatcher(&transport));

    let token = CancellationToken::new();
    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let flags = RequestFlags::new().abort_on(token.clone());
        tokio::spawn(async move { dispatcher.request(URL, flags).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, RequestError::Aborted));
    assert_eq!(dispatcher.lanes().normal.in_use(), 0);
}

#[tokio::test]
async fn priority_requests_use_the_priority_lane() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("normal")));
    transport.push(Ok(ok("urgent")));
    let dispatcher = dispatcher(&transport);

    dispatcher
        .request(URL, RequestFlags::new().cache(false))
        .await
        .unwrap();
    dispatcher
        .request(URL, RequestFlags::new().cache(false).priority())
        .await
        .unwrap();

    let slots: Vec<u32> = transport.sent.lock().iter().map(|(slot, _)| *slot).collect();
    assert!(dispatcher.lanes().normal.owns(slots[0]));
    assert!(dispatcher.lanes().priority.owns(slots[1]));
}

#[tokio::test]
async fn custom_cache_round_trip() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    let dispatcher = dispatcher(&transport);

    dispatcher
        .save_custom_cache("session", &vec!["a", "b"], None)
        .await
        .unwrap();
    let loaded: Option<Vec<String>> = dispatcher.get_custom_cache("session").await.unwrap();
    assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));

    assert_eq!(dispatcher.clear_cache().await.unwrap(), 1);
    let gone: Option<Vec<String>> = dispatcher.get_custom_cache("session").await.unwrap();
    assert!(gone.is_none());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn initialize_sizes_budget_once_for_host_transport() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::HostService));
    let dispatcher = dispatcher(&transport);
    let profile = DeviceProfile::new(512, DisplayClass::UltraHd, true);

    let budget = dispatcher.initialize(&profile).await.unwrap();
    assert_eq!(budget, Some(ByteBudget::from_mib(120)));
    let stats = dispatcher.cache_stats().await.unwrap().unwrap();
    assert_eq!(stats.budget_bytes, ByteBudget::from_mib(120).as_bytes());

    let again = dispatcher.initialize(&profile).await;
    assert!(matches!(again, Err(RequestError::Config(_))));
}

#[tokio::test]
async fn network_transport_keeps_fallback_budget() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    let dispatcher = dispatcher(&transport);
    let profile = DeviceProfile::new(512, DisplayClass::UltraHd, true);

    assert_eq!(dispatcher.initialize(&profile).await.unwrap(), None);
    let stats = dispatcher.cache_stats().await.unwrap().unwrap();
    assert_eq!(stats.budget_bytes, ByteBudget::FALLBACK.as_bytes());
}

#[tokio::test]
async fn requests_after_shutdown_bypass_the_cache() {
    let transport = Arc::new(ScriptedTransport::new(TransportKind::Network));
    transport.push(Ok(ok("one")));
    transport.push(Ok(ok("two")));
    let dispatcher = dispatcher(&transport);

    dispatcher.get(URL).await.unwrap();
    dispatcher.shutdown().await.unwrap();

    assert_eq!(dispatcher.get(URL).await.unwrap().text(), "two");
    assert_eq!(transport.calls(), 2);
}
