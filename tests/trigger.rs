mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use planets_site::job::SiteJob;
use planets_site::trigger::router;
use support::Harness;
use tower::ServiceExt;

const PUSH_BODY: &str = r#"{
    "message": {
        "data": "eyJzb3VyY2UiOiAic2NoZWR1bGVyIn0=",
        "messageId": "136969346945",
        "publishTime": "2024-05-01T12:00:00Z"
    },
    "subscription": "projects/dotufp/subscriptions/update-planets-site"
}"#;

fn push(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_push_publishes_page() {
    let harness = Harness::with_counters("4500", "5300");
    let app = router(Arc::new(SiteJob::new(&harness.config, &harness.clients())));

    let response = app.oneshot(push(PUSH_BODY)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.published_page().is_some());
}

#[tokio::test]
async fn test_each_push_is_an_independent_invocation() {
    let harness = Harness::with_counters("4500", "5300");
    let app = router(Arc::new(SiteJob::new(&harness.config, &harness.clients())));

    for _ in 0..2 {
        let response = app.clone().oneshot(push(PUSH_BODY)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    assert_eq!(harness.kms.decrypts.load(Ordering::SeqCst), 2);
    assert_eq!(harness.kv.connects.load(Ordering::SeqCst), 2);
    assert_eq!(harness.storage.puts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_run_asks_for_redelivery() {
    let harness = Harness::new();
    let app = router(Arc::new(SiteJob::new(&harness.config, &harness.clients())));

    let response = app.oneshot(push(PUSH_BODY)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(harness.published_page().is_none());
}

#[tokio::test]
async fn test_malformed_envelope_is_rejected() {
    let harness = Harness::with_counters("4500", "5300");
    let app = router(Arc::new(SiteJob::new(&harness.config, &harness.clients())));

    let response = app.oneshot(push(r#"{"not": "a push"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.kms.decrypts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_healthz() {
    let harness = Harness::new();
    let app = router(Arc::new(SiteJob::new(&harness.config, &harness.clients())));

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
