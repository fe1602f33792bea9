//! Cross-instance fan-out over a shared backbone.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{eventually, test_settings, FlakyBus, TestApp};
use chat_gateway::domain::ChannelName;
use chat_gateway::infrastructure::pubsub::MemoryBus;

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_publish_reaches_subscribers_on_other_instance() {
    let bus = MemoryBus::default();
    let a = TestApp::spawn(&bus).await;
    let b = TestApp::spawn(&bus).await;

    let mut publisher = a.connect_as("1").await;
    let mut listener = b.connect_as("2").await;
    let mut bystander = b.connect_as("3").await;

    publisher.subscribe("room:42").await;
    listener.subscribe("room:42").await;
    bystander.subscribe("room:7").await;

    publisher.publish("room:42", json!({ "text": "hello" })).await;

    let event = listener.recv().await;
    assert_eq!(
        event,
        json!({ "op": "event", "channel": "room:42", "payload": { "text": "hello" } })
    );
    assert!(bystander.try_recv(QUIET).await.is_none());
}

#[tokio::test]
async fn test_publisher_instance_delivers_exactly_once() {
    let bus = MemoryBus::default();
    let a = TestApp::spawn(&bus).await;
    let _b = TestApp::spawn(&bus).await;

    let mut publisher = a.connect_as("1").await;
    let mut neighbour = a.connect_as("2").await;
    publisher.subscribe("room:1").await;
    neighbour.subscribe("room:1").await;

    publisher.publish("room:1", json!(1)).await;

    assert_eq!(publisher.recv().await["payload"], 1);
    assert_eq!(neighbour.recv().await["payload"], 1);
    // The backbone copy carrying A's own origin is ignored
    assert!(publisher.try_recv(QUIET).await.is_none());
    assert!(neighbour.try_recv(QUIET).await.is_none());
}

#[tokio::test]
async fn test_disconnected_connection_is_no_longer_reached() {
    let bus = MemoryBus::default();
    let a = TestApp::spawn(&bus).await;
    let b = TestApp::spawn(&bus).await;

    let mut publisher = a.connect_as("1").await;
    publisher.subscribe("room:42").await;

    let mut leaver = b.connect_as("2").await;
    leaver.subscribe("room:42").await;
    leaver.close().await;

    let registry = b.state.sockets.registry().clone();
    let room = ChannelName::parse("room:42").unwrap();
    assert!(eventually(|| registry.connection_count() == 0).await);
    assert!(registry.subscribers(&room).is_empty());

    publisher.publish("room:42", json!("anyone?")).await;
    assert_eq!(publisher.recv().await["payload"], "anyone?");
    assert_eq!(registry.deliver(&room, &json!(null)), 0);
}

#[tokio::test]
async fn test_delivery_resumes_after_backbone_loss() {
    let bus = MemoryBus::default();
    let flaky = Arc::new(FlakyBus::new(&bus));
    let a = TestApp::spawn(&bus).await;
    let b = TestApp::spawn_on(flaky.clone(), test_settings(), Vec::new()).await;

    let mut publisher = a.connect_as("1").await;
    let mut listener = b.connect_as("2").await;
    publisher.subscribe("room:42").await;
    listener.subscribe("room:42").await;

    flaky.sever();
    let fanout = b.state.sockets.fanout().clone();
    assert!(eventually(|| fanout.reconnect_count() == 1 && fanout.is_connected()).await);
    assert_eq!(flaky.connect_calls(), 2);

    publisher.publish("room:42", json!("still here")).await;
    assert_eq!(listener.recv().await["payload"], "still here");
}
