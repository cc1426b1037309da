mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(StatusCode::OK, response.status());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "agency-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/ready"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(StatusCode::OK, response.status());
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/metrics"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(StatusCode::OK, response.status());
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    // The health poll during spawn already went through the tenant router,
    // so the routing counter family exists.
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("agency_route_decisions_total"));
}

#[tokio::test]
async fn security_headers_distinguish_pages_from_operational_endpoints() {
    use agency_service::identity::{IdentityProvider, StaticIdentityProvider};
    use agency_service::services::{ActivityLog, MembershipService};
    use agency_service::store::{AgencyStore, MemoryStore};
    use agency_service::{build_router, AppState};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    let store: Arc<dyn AgencyStore> = Arc::new(MemoryStore::new());
    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider::new());
    let activity = ActivityLog::new(store.clone());
    let state = AppState {
        config: common::test_config(),
        store: store.clone(),
        identity: identity.clone(),
        resolver: MembershipService::new(store, identity, activity.clone()),
        activity,
    };
    let app = build_router(state);

    let page = app
        .clone()
        .oneshot(Request::builder().uri("/site").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, page.status());
    assert_eq!(
        "nosniff",
        page.headers().get("x-content-type-options").unwrap()
    );
    let page_csp = page
        .headers()
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(page_csp.contains("default-src 'self'"));

    let machine = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let machine_csp = machine
        .headers()
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(machine_csp.contains("default-src 'none'"));

    let body = machine.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&body).expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
}
