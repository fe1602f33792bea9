//! Common Test Utilities
//!
//! In-process gateways wired to a fake store and a shared in-memory
//! backbone, plus HTTP and WebSocket client helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::{IntoResponse, Response},
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, watch};
use tokio_tungstenite::{
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

use chat_gateway::config::Settings;
use chat_gateway::domain::{AuthenticatedOnly, Session};
use chat_gateway::infrastructure::database::{StoreBackend, StoreError, StoreEvent};
use chat_gateway::infrastructure::pubsub::{Backbone, BackboneConnector, FanoutError, MemoryBus};
use chat_gateway::presentation::http::RouteModule;
use chat_gateway::presentation::middleware::SessionKeys;
use chat_gateway::startup::{AppState, Application};

pub const CLIENT_URL: &str = "http://localhost:3000";
pub const KEY_ONE: &str = "first-secret-key-that-is-long-enough-0001";
pub const KEY_TWO: &str = "second-secret-key-that-is-long-enough-002";

pub fn test_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("SECRET_KEY_ONE", KEY_ONE),
        ("SECRET_KEY_TWO", KEY_TWO),
        ("RUN_ENV", "test"),
        ("CLIENT_URL", CLIENT_URL),
        ("REDIS_HOST", "redis://127.0.0.1:6379"),
        ("SERVER_HOST", "127.0.0.1"),
        ("SERVER_PORT", "0"),
        ("DATABASE_RECONNECT_INITIAL_MS", "10"),
        ("DATABASE_RECONNECT_MAX_MS", "50"),
        ("REDIS_RECONNECT_INITIAL_MS", "10"),
        ("REDIS_RECONNECT_MAX_MS", "50"),
    ]
}

pub fn test_settings() -> Settings {
    Settings::from_env_map(test_env()).expect("test settings are valid")
}

/// Store double: connects instantly and lets tests inject disconnects.
pub struct FakeStore {
    events: broadcast::Sender<StoreEvent>,
    connects: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            connects: AtomicU32::new(0),
        }
    }

    pub fn disconnect(&self) {
        let _ = self.events.send(StoreEvent::Disconnected);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for FakeStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(StoreEvent::Connected);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Memory backbone whose subscriptions can be cut and whose connects can
/// be refused, like a Redis server going away.
pub struct FlakyBus {
    bus: MemoryBus,
    severed: watch::Sender<()>,
    refusing: AtomicBool,
    connects: AtomicU32,
}

impl FlakyBus {
    pub fn new(bus: &MemoryBus) -> Self {
        let (severed, _) = watch::channel(());
        Self {
            bus: bus.clone(),
            severed,
            refusing: AtomicBool::new(false),
            connects: AtomicU32::new(0),
        }
    }

    /// End every event stream handed out so far.
    pub fn sever(&self) {
        self.severed.send_replace(());
    }

    pub fn refuse(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackboneConnector for FlakyBus {
    async fn connect(&self) -> Result<Backbone, FanoutError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(FanoutError::Unavailable("connection refused".into()));
        }

        let backbone = self.bus.attach();
        let mut severed = self.severed.subscribe();
        let events = backbone
            .events
            .take_until(async move {
                let _ = severed.changed().await;
            })
            .boxed();
        Ok(Backbone {
            publisher: backbone.publisher,
            events,
        })
    }

    fn name(&self) -> &'static str {
        "flaky-memory"
    }
}

/// A running gateway instance.
pub struct TestApp {
    pub addr: SocketAddr,
    pub router: Router,
    pub state: AppState,
    pub store: Arc<FakeStore>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn(bus: &MemoryBus) -> Self {
        Self::spawn_with(bus, test_settings(), Vec::new()).await
    }

    pub async fn spawn_with(
        bus: &MemoryBus,
        settings: Settings,
        modules: Vec<Box<dyn RouteModule>>,
    ) -> Self {
        Self::spawn_on(Arc::new(bus.clone()), settings, modules).await
    }

    pub async fn spawn_on(
        backbone: Arc<dyn BackboneConnector>,
        settings: Settings,
        modules: Vec<Box<dyn RouteModule>>,
    ) -> Self {
        let store = Arc::new(FakeStore::new());
        let app = Application::build_with(
            settings,
            store.clone(),
            backbone,
            Arc::new(AuthenticatedOnly),
            modules,
        )
        .await
        .expect("application builds");

        let addr = app.local_addr().unwrap();
        let router = app.router();
        let state = app.state().clone();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(app.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            router,
            state,
            store,
            shutdown: Some(tx),
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Open a socket carrying `cookie`, consuming the `hello` frame.
    pub async fn connect(&self, cookie: Option<&str>) -> (WsClient, Value) {
        let mut request = format!("ws://{}/gateway", self.addr)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert(header::ORIGIN, CLIENT_URL.parse().unwrap());
        if let Some(cookie) = cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let (ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        let mut client = WsClient { ws };
        let hello = client.recv().await;
        assert_eq!(hello["op"], "hello");
        (client, hello)
    }

    /// Connect with a freshly issued authenticated session.
    pub async fn connect_as(&self, user_id: &str) -> WsClient {
        let cookie = session_cookie(&self.state.sessions, &Session::authenticated(user_id));
        let (client, hello) = self.connect(Some(&cookie)).await;
        assert_eq!(hello["authenticated"], true);
        client
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct WsClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn send(&mut self, frame: Value) {
        self.ws.send(Message::text(frame.to_string())).await.unwrap();
    }

    /// Next text frame as JSON; fails the test after two seconds.
    pub async fn recv(&mut self) -> Value {
        self.try_recv(Duration::from_secs(2))
            .await
            .expect("expected a frame")
    }

    pub async fn try_recv(&mut self, wait: Duration) -> Option<Value> {
        tokio::time::timeout(wait, async {
            while let Some(message) = self.ws.next().await {
                if let Message::Text(text) = message.ok()? {
                    return serde_json::from_str(text.as_str()).ok();
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn subscribe(&mut self, channel: &str) {
        self.send(serde_json::json!({ "op": "subscribe", "channel": channel }))
            .await;
        let reply = self.recv().await;
        assert_eq!(reply["op"], "subscribed", "unexpected reply {reply}");
    }

    pub async fn publish(&mut self, channel: &str, payload: Value) {
        self.send(serde_json::json!({ "op": "publish", "channel": channel, "payload": payload }))
            .await;
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// `name=value` pair for a `Cookie` request header.
pub fn session_cookie(keys: &SessionKeys, session: &Session) -> String {
    let response = keys.issue(session).unwrap().into_response();
    set_cookie_pair(&response).expect("issued jar sets a cookie")
}

/// The `name=value` part of the response's session `Set-Cookie`, if any.
pub fn set_cookie_pair(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_owned)
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Settings after rotating: key two signs, key one is still accepted.
pub fn rotated_settings() -> Settings {
    let env = test_env().into_iter().map(|(k, v)| match k {
        "SECRET_KEY_ONE" => (k, KEY_TWO),
        "SECRET_KEY_TWO" => (k, KEY_ONE),
        _ => (k, v),
    });
    Settings::from_env_map(env).expect("rotated settings are valid")
}
