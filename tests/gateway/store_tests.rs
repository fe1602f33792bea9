//! Durable store reconnection while the gateway keeps serving.

use std::time::Duration;

use axum::http::StatusCode;

use crate::common::{eventually, TestApp};
use chat_gateway::infrastructure::pubsub::MemoryBus;

#[tokio::test]
async fn test_each_disconnect_triggers_one_reconnect() {
    let app = TestApp::spawn(&MemoryBus::default()).await;
    let connector = app.state.store.clone();
    assert_eq!(app.store.connect_calls(), 1);

    app.store.disconnect();
    assert!(eventually(|| connector.reconnect_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.store.connect_calls(), 2);

    app.store.disconnect();
    assert!(eventually(|| connector.reconnect_count() == 2).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.store.connect_calls(), 3);

    // Still serving
    assert!(connector.is_connected());
    assert_eq!(app.get("/health/ready").await.status(), StatusCode::OK);
}
