//! Connection Registry
//!
//! Tracks live socket connections, their sessions and channel
//! subscriptions, and delivers channel events to local subscribers.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::domain::{ChannelName, Session};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub type ConnectionId = Uuid;

/// A live connection owned by the registry.
pub struct Connection {
    pub id: ConnectionId,
    pub session: Option<Session>,
    sender: mpsc::UnboundedSender<ServerMessage>,
    channels: Mutex<HashSet<ChannelName>>,
}

impl Connection {
    pub fn is_subscribed(&self, channel: &ChannelName) -> bool {
        self.channels.lock().contains(channel)
    }

    pub fn channels(&self) -> Vec<ChannelName> {
        self.channels.lock().iter().cloned().collect()
    }

    fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Registry of the connections held by this process.
#[derive(Default)]
pub struct ConnectionRegistry {
    /// Active connections by id
    connections: DashMap<ConnectionId, Arc<Connection>>,
    /// Channel to subscribed connection ids
    channels: DashMap<ChannelName, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection under a fresh id.
    pub fn register(
        &self,
        session: Option<Session>,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> ConnectionId {
        let id = Uuid::new_v4();
        let connection = Arc::new(Connection {
            id,
            session,
            sender,
            channels: Mutex::new(HashSet::new()),
        });

        self.connections.insert(id, connection);
        metrics::set_websocket_connections(self.connections.len());
        tracing::info!(connection_id = %id, "Connection registered");
        id
    }

    /// Remove a connection and drop all of its subscriptions.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let Some((_, connection)) = self.connections.remove(&id) else {
            return false;
        };

        let channels: Vec<ChannelName> = connection.channels.lock().drain().collect();
        for channel in &channels {
            self.remove_subscriber(channel, id);
        }

        metrics::set_websocket_connections(self.connections.len());
        tracing::info!(
            connection_id = %id,
            dropped_subscriptions = channels.len(),
            "Connection unregistered"
        );
        true
    }

    /// Add a channel subscription. Returns `false` if it already existed.
    pub fn subscribe(&self, id: ConnectionId, channel: &ChannelName) -> Result<bool, AppError> {
        let connection = self.get(id)?;
        let added = connection.channels.lock().insert(channel.clone());
        if added {
            self.channels.entry(channel.clone()).or_default().insert(id);
            tracing::debug!(connection_id = %id, channel = %channel, "Subscribed");
        }
        Ok(added)
    }

    /// Remove a channel subscription. Returns `false` if there was none.
    pub fn unsubscribe(&self, id: ConnectionId, channel: &ChannelName) -> Result<bool, AppError> {
        let connection = self.get(id)?;
        let removed = connection.channels.lock().remove(channel);
        if removed {
            self.remove_subscriber(channel, id);
            tracing::debug!(connection_id = %id, channel = %channel, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Deliver an event to every local subscriber of `channel`.
    /// Returns the number of connections reached.
    pub fn deliver(&self, channel: &ChannelName, payload: &serde_json::Value) -> usize {
        let subscribers: Vec<ConnectionId> = match self.channels.get(channel) {
            Some(ids) => ids.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for id in subscribers {
            let Some(connection) = self.connections.get(&id).map(|c| Arc::clone(c.value())) else {
                continue;
            };
            let message = ServerMessage::Event {
                channel: channel.clone(),
                payload: payload.clone(),
            };
            if connection.send(message) {
                delivered += 1;
            }
        }

        metrics::record_fanout_deliveries(delivered);
        delivered
    }

    /// Send a message to a single connection.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        self.connections
            .get(&id)
            .map(|c| c.send(message))
            .unwrap_or(false)
    }

    pub fn get(&self, id: ConnectionId) -> Result<Arc<Connection>, AppError> {
        self.connections
            .get(&id)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| AppError::not_found(format!("Connection {id} is not registered")))
    }

    pub fn is_subscribed(&self, id: ConnectionId, channel: &ChannelName) -> bool {
        self.connections
            .get(&id)
            .map(|c| c.is_subscribed(channel))
            .unwrap_or(false)
    }

    pub fn subscribers(&self, channel: &ChannelName) -> Vec<ConnectionId> {
        self.channels
            .get(channel)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Get connection count
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Channels with at least one local subscriber
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn remove_subscriber(&self, channel: &ChannelName, id: ConnectionId) {
        if let Some(mut ids) = self.channels.get_mut(channel) {
            ids.remove(&id);
        }
        self.channels.remove_if(channel, |_, ids| ids.is_empty());
    }
}
