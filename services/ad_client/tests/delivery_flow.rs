//! Request, selection, retry and impression behavior of the delivery engine.

mod support;

use ad_client_lib::delivery::{DeliveryEvent, EventKind, RequestOverrides};
use ad_client_lib::error::DeliveryError;
use ad_delivery_core::{AdInput, AdResponse, RequestMode, TransportError};
use std::time::Duration;
use support::*;

#[tokio::test]
async fn missing_credential_fails_before_any_network_call() {
    let h = harness(None, options(), vec![ads(vec![ad("TechCorp")])], false).await;

    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await;

    assert!(matches!(result, Err(DeliveryError::Configuration(_))));
    assert_eq!(h.transport.calls(), 0);
    assert!(h.beacons.fired().is_empty());
}

#[tokio::test]
async fn returns_only_the_first_ad_and_fires_its_impression() {
    let h = harness(
        Some("key-1"),
        options(),
        vec![ads(vec![ad("TechCorp"), ad("OtherCo")])],
        false,
    )
    .await;

    let selected = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap()
        .unwrap();
    h.engine.flush_beacons().await;

    assert_eq!(selected.advertiser, "TechCorp");
    assert_eq!(h.beacons.fired(), vec!["https://track.test/pixel/techcorp"]);
    assert!(h
        .engine
        .session()
        .fired_pixels
        .contains("https://track.test/pixel/techcorp"));
    assert_eq!(
        h.events_of(EventKind::AdLoaded),
        vec![DeliveryEvent::AdLoaded(selected)]
    );
}

#[tokio::test]
async fn impression_is_dispatched_before_the_ad_is_returned() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;

    h.engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();

    // Reserved synchronously during selection, whatever the beacon's progress.
    assert!(!h
        .engine
        .session()
        .fired_pixels
        .try_reserve("https://track.test/pixel/techcorp"));
}

#[tokio::test]
async fn sends_the_user_query_payload_with_credential() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;

    h.engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.endpoint, "https://ads.test/ads/user-query");
    assert_eq!(request.api_key, "key-1");
    assert_eq!(request.timeout, Duration::from_millis(10_000));
    assert_eq!(request.payload.user_prompt.as_deref(), Some("best laptop"));
    assert_eq!(request.payload.agent_response, None);
    assert_eq!(request.payload.user_id, "user-1");
    assert_eq!(request.payload.platform, "web");
    assert_eq!(request.payload.location, "US");
}

#[tokio::test]
async fn per_call_mode_does_not_change_the_session_default() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;

    let input = AdInput::Structured {
        query: None,
        response: Some("Try a lightweight laptop".to_string()),
    };
    h.engine
        .request_ad(input, RequestOverrides::with_mode(RequestMode::AgentResponse))
        .await
        .unwrap();
    h.engine
        .request_ad("next", RequestOverrides::default())
        .await
        .unwrap();

    let requests = h.transport.requests();
    assert_eq!(requests[0].endpoint, "https://ads.test/ads/agent-response");
    assert_eq!(
        requests[0].payload.agent_response.as_deref(),
        Some("Try a lightweight laptop")
    );
    assert_eq!(requests[1].endpoint, "https://ads.test/ads/user-query");
    assert_eq!(h.engine.session().mode, RequestMode::UserQuery);
}

#[tokio::test]
async fn empty_result_is_no_ad_not_an_error() {
    let h = harness(
        Some("key-1"),
        options(),
        vec![Ok(AdResponse {
            ads: Some(vec![]),
            total: Some(0),
        })],
        false,
    )
    .await;

    let result = h
        .engine
        .request_ad("anything", RequestOverrides::default())
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(h.events_of(EventKind::NoAd).len(), 1);
    assert!(h.events_of(EventKind::Error).is_empty());
    assert!(h.events_of(EventKind::AdLoaded).is_empty());
}

#[tokio::test]
async fn absent_ads_list_is_no_ad() {
    let h = harness(Some("key-1"), options(), vec![Ok(AdResponse::default())], false).await;

    let result = h
        .engine
        .request_ad("anything", RequestOverrides::default())
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(h.events_of(EventKind::NoAd).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_with_linear_backoff_until_success() {
    let mut opts = options();
    opts.max_retries = 2;
    let h = harness(
        Some("key-1"),
        opts,
        vec![
            unavailable(),
            Err(TransportError::Timeout { timeout_ms: 10_000 }),
            ads(vec![ad("TechCorp")]),
        ],
        false,
    )
    .await;

    let started = tokio::time::Instant::now();
    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();

    assert_eq!(result.map(|ad| ad.advertiser).as_deref(), Some("TechCorp"));
    assert_eq!(h.transport.calls(), 3);
    // 100ms after the first failure, 200ms after the second.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(300), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(400), "waited {:?}", waited);
    assert!(h.events_of(EventKind::Error).is_empty());
}

#[tokio::test(start_paused = true)]
async fn surfaces_the_last_error_once_retries_are_exhausted() {
    let mut opts = options();
    opts.max_retries = 1;
    let h = harness(
        Some("key-1"),
        opts,
        vec![
            Err(TransportError::Network("connection reset".to_string())),
            unavailable(),
        ],
        false,
    )
    .await;

    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await;

    let expected = DeliveryError::Transport(TransportError::Http {
        status: 503,
        message: "backend unavailable".to_string(),
    });
    assert_eq!(result, Err(expected.clone()));
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(
        h.events_of(EventKind::Error),
        vec![DeliveryEvent::Error(expected)]
    );
}

#[tokio::test(start_paused = true)]
async fn largest_retry_budget_still_retries() {
    let mut opts = options();
    opts.max_retries = u32::MAX;
    let h = harness(
        Some("key-1"),
        opts,
        vec![unavailable(), ads(vec![ad("TechCorp")])],
        false,
    )
    .await;

    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();

    assert!(result.is_some());
    assert_eq!(h.transport.calls(), 2);
}

#[tokio::test]
async fn no_retry_by_default() {
    let h = harness(Some("key-1"), options(), vec![unavailable()], false).await;

    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await;

    assert!(matches!(result, Err(ref e) if e.is_transient()));
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn impression_fires_once_per_pixel_across_deliveries() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;

    for _ in 0..3 {
        h.engine
            .request_ad("best laptop", RequestOverrides::default())
            .await
            .unwrap();
        h.engine.flush_beacons().await;
    }

    assert_eq!(h.beacons.count("https://track.test/pixel/techcorp"), 1);
    assert_eq!(h.events_of(EventKind::AdLoaded).len(), 3);
}

#[tokio::test]
async fn concurrent_deliveries_share_one_impression() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;

    let (a, b) = tokio::join!(
        h.engine.request_ad("one", RequestOverrides::default()),
        h.engine.request_ad("two", RequestOverrides::default()),
    );
    a.unwrap();
    b.unwrap();
    h.engine.flush_beacons().await;

    assert_eq!(h.beacons.count("https://track.test/pixel/techcorp"), 1);
}

#[tokio::test]
async fn failed_impression_beacon_may_be_retried_by_a_later_delivery() {
    let h = harness(Some("key-1"), options(), vec![ads(vec![ad("TechCorp")])], false).await;
    let pixel = "https://track.test/pixel/techcorp";
    h.beacons.fail(pixel);

    let first = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await;
    h.engine.flush_beacons().await;

    // The beacon failure never reaches the caller.
    assert!(first.unwrap().is_some());
    assert!(!h.engine.session().fired_pixels.contains(pixel));

    h.beacons.recover(pixel);
    h.engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();
    h.engine.flush_beacons().await;

    assert_eq!(h.beacons.count(pixel), 2);
    assert!(h.engine.session().fired_pixels.contains(pixel));
}

#[tokio::test]
async fn ad_without_pixel_sends_no_impression() {
    let mut silent = ad("Quiet");
    silent.pixel_url = None;
    let h = harness(Some("key-1"), options(), vec![ads(vec![silent])], false).await;

    let result = h
        .engine
        .request_ad("best laptop", RequestOverrides::default())
        .await
        .unwrap();
    h.engine.flush_beacons().await;

    assert!(result.is_some());
    assert!(h.beacons.fired().is_empty());
}
