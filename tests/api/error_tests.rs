//! Error contract: every failure is JSON `{message, status, kind}`.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use pretty_assertions::assert_eq;
use test_case::test_case;

use super::ProbeRoutes;
use crate::common::{body_json, test_settings, TestApp};
use chat_gateway::infrastructure::pubsub::MemoryBus;
use chat_gateway::presentation::http::MAX_BODY_BYTES;

async fn app() -> TestApp {
    TestApp::spawn_with(&MemoryBus::default(), test_settings(), vec![Box::new(ProbeRoutes)]).await
}

#[test_case("/nope" ; "top level")]
#[test_case("/api/v1/rooms/42/messages" ; "nested")]
#[tokio::test]
async fn test_unmatched_path_is_not_found(path: &str) {
    let app = app().await;

    let response = app.get(path).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["status"], 404);
    assert_eq!(json["kind"], "NotFound");
    assert!(json["message"].as_str().unwrap().contains(path));
}

#[test_case("POST", "/health" ; "post to a get route")]
#[test_case("PUT", "/gateway" ; "put to the socket endpoint")]
#[test_case("DELETE", "/metrics" ; "delete metrics")]
#[tokio::test]
async fn test_unrouted_method_is_not_found(method: &str, path: &str) {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["kind"], "NotFound");
    assert!(json["message"].as_str().unwrap().contains(path));
}

#[tokio::test]
async fn test_plain_get_on_socket_endpoint_is_json_bad_request() {
    let app = app().await;

    let response = app.get("/gateway").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
    assert_eq!(json["kind"], "BadRequest");
    assert!(!json["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_uses_default_message() {
    let app = app().await;

    let response = app.get("/probe/unauthorized").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Unauthorized");
}

#[tokio::test]
async fn test_unauthorized_keeps_custom_message() {
    let app = app().await;

    let response = app.get("/probe/unauthorized-custom").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token expired");
}

#[tokio::test]
async fn test_unexpected_error_is_redacted() {
    let app = app().await;

    let response = app.get("/probe/unexpected").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Internal server error");
    assert_eq!(json["kind"], "ServerError");
    assert!(!json.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_panic_becomes_server_error() {
    let app = app().await;

    let response = app.get("/probe/panic").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["message"], "Internal server error");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app().await;

    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/probe/echo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"unterminated\": "))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["kind"], "BadRequest");
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let app = app().await;

    let mut body = Vec::with_capacity(MAX_BODY_BYTES + 16);
    body.extend_from_slice(b"\"");
    body.resize(MAX_BODY_BYTES + 8, b'a');
    body.extend_from_slice(b"\"");

    let response = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/probe/echo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert!(response.status().is_client_error());
}
