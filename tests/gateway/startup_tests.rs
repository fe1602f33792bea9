//! Startup gates: nothing listens unless the store and backbone are up.

use std::net::TcpListener;
use std::sync::Arc;

use crate::common::{test_env, FakeStore, FlakyBus};
use chat_gateway::config::Settings;
use chat_gateway::domain::AuthenticatedOnly;
use chat_gateway::infrastructure::pubsub::MemoryBus;
use chat_gateway::startup::{Application, StartupError};

/// Settings bound to a port that is free right now.
fn settings_on_free_port() -> (Settings, u16) {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let port_value = port.to_string();
    let env = test_env()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| k != "SERVER_PORT")
        .chain([("SERVER_PORT".to_string(), port_value)]);
    (Settings::from_env_map(env).unwrap(), port)
}

#[tokio::test]
async fn test_unreachable_backbone_aborts_startup() {
    let (settings, port) = settings_on_free_port();
    let backbone = Arc::new(FlakyBus::new(&MemoryBus::default()));
    backbone.refuse(true);
    let store = Arc::new(FakeStore::new());

    let result = Application::build_with(
        settings,
        store.clone(),
        backbone.clone(),
        Arc::new(AuthenticatedOnly),
        Vec::new(),
    )
    .await;

    assert!(matches!(result, Err(StartupError::Backbone(_))));
    assert_eq!(backbone.connect_calls(), 1);
    // The store was still attempted concurrently
    assert_eq!(store.connect_calls(), 1);
    // Nothing was bound
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[tokio::test]
async fn test_reachable_backbone_starts_listening() {
    let (settings, port) = settings_on_free_port();
    let backbone = Arc::new(FlakyBus::new(&MemoryBus::default()));

    let app = Application::build_with(
        settings,
        Arc::new(FakeStore::new()),
        backbone,
        Arc::new(AuthenticatedOnly),
        Vec::new(),
    )
    .await
    .unwrap();

    assert_eq!(app.local_addr().unwrap().port(), port);
    assert!(app.state().sockets.fanout().is_connected());
}
