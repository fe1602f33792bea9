//! Standard middleware chain: CORS, security headers, compression and the
//! parameter pollution guard.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use pretty_assertions::assert_eq;

use super::ProbeRoutes;
use crate::common::{body_json, test_settings, TestApp, CLIENT_URL};
use chat_gateway::infrastructure::pubsub::MemoryBus;

async fn app() -> TestApp {
    TestApp::spawn_with(&MemoryBus::default(), test_settings(), vec![Box::new(ProbeRoutes)]).await
}

#[tokio::test]
async fn test_cors_allows_configured_origin_with_credentials() {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, CLIENT_URL)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], CLIENT_URL);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_cors_preflight_lists_methods() {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/probe/echo")
                .header(header::ORIGIN, CLIENT_URL)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{method} missing from {methods}");
    }
}

#[tokio::test]
async fn test_cors_ignores_foreign_origin() {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = app().await;

    // Error responses included
    let response = app.get("/does-not-exist").await;
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    // RUN_ENV=test is not a development environment
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_large_responses_are_gzipped() {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .uri("/probe/large")
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn test_repeated_query_keys_keep_last_value() {
    let app = app().await;

    let response = app.get("/probe/query?room=a&limit=10&room=b").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["query"], "room=b&limit=10");
    assert_eq!(json["polluted"], serde_json::json!(["room"]));
}
