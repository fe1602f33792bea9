//! WebSocket Connection Handler
//!
//! Upgrades `/gateway` requests and drives each connection until it closes.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use super::events::SocketEventRouter;
use super::messages::ServerMessage;
use crate::domain::Session;
use crate::presentation::middleware::CurrentSession;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler. A request that is not a valid upgrade gets
/// a `BadRequest` body like any other error.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentSession(session): CurrentSession,
) -> Result<Response, AppError> {
    check_origin(&headers, &state.settings.server.client_url)?;
    let ws = ws?;

    let router = state.sockets.clone();
    Ok(ws
        .max_message_size(state.settings.websocket.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, router, session)))
}

/// Browsers always send `Origin` on upgrade; a missing one is a
/// non-browser client and is admitted.
fn check_origin(headers: &HeaderMap, allowed: &str) -> Result<(), AppError> {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Ok(());
    };

    let origin = origin.to_str().unwrap_or_default();
    if origin.trim_end_matches('/') == allowed.trim_end_matches('/') {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("Origin {origin} is not allowed")))
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, router: SocketEventRouter, session: Session) {
    let (sender, receiver) = socket.split();
    serve_connection(sender, receiver, router, session).await;
}

/// Drive one connection until either half closes, then deregister it.
async fn serve_connection<W, R>(sender: W, mut receiver: R, router: SocketEventRouter, session: Session)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();

    let authenticated = session.is_authenticated();
    let id = router.registry().register(Some(session), tx.clone());

    let mut sender_task = tokio::spawn(forward(rx, sender));

    let _ = tx.send(ServerMessage::Hello {
        connection_id: id,
        authenticated,
    });

    loop {
        let msg = tokio::select! {
            _ = &mut sender_task => {
                tracing::debug!(connection_id = %id, "Write half closed");
                break;
            }
            msg = receiver.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                if let Some(reply) = router.dispatch(id, text.as_str()).await {
                    if tx.send(reply).is_err() {
                        break;
                    }
                }
            }
            Some(Ok(Message::Binary(_))) => {
                let report = AppError::bad_request("Binary frames are not supported").report();
                if tx.send(ServerMessage::Error(report)).is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(connection_id = %id, "Connection closed by client");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(connection_id = %id, error = %e, "WebSocket error");
                break;
            }
            // Pings are answered by axum
            Some(Ok(_)) => {}
        }
    }

    // Cleanup
    router.registry().unregister(id);
    drop(tx);
    sender_task.abort();
}

/// Forward queued messages to the socket until the queue closes or a write fails.
async fn forward<W>(mut rx: mpsc::UnboundedReceiver<ServerMessage>, mut sender: W)
where
    W: Sink<Message> + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let text = match serde_json::to_string(&msg) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
