//! Tracks which connections have joined which conversation token.

use std::collections::HashMap;
use std::sync::Arc;
use log::debug;
use tokio::sync::{ mpsc, RwLock };
use uuid::Uuid;

use crate::models::websocket::ServerMessage;

pub type ConnectionId = Uuid;
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// Rooms keyed by token. A connection may sit in several rooms at once.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    rooms: Arc<RwLock<HashMap<String, HashMap<ConnectionId, ClientSender>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to the room for `token`. Joining twice is a no-op.
    pub async fn join(&self, token: &str, conn_id: ConnectionId, sender: ClientSender) {
        let mut w = self.rooms.write().await;
        w.entry(token.to_string()).or_default().insert(conn_id, sender);
        debug!("Connection {} joined room {}", conn_id, token);
    }

    /// Removes the connection from every room; empty rooms are dropped.
    pub async fn leave_all(&self, conn_id: ConnectionId) {
        let mut w = self.rooms.write().await;
        w.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Sends `msg` to every connection in the room and returns how many
    /// received it. Senders whose connection is gone are pruned.
    pub async fn broadcast(&self, token: &str, msg: ServerMessage) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let r = self.rooms.read().await;
            let Some(members) = r.get(token) else {
                return 0;
            };
            for (conn_id, sender) in members {
                if sender.send(msg.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*conn_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut w = self.rooms.write().await;
            if let Some(members) = w.get_mut(token) {
                for conn_id in &dead {
                    members.remove(conn_id);
                }
                if members.is_empty() {
                    w.remove(token);
                }
            }
        }
        delivered
    }

    pub async fn subscriber_count(&self, token: &str) -> usize {
        self.rooms
            .read().await
            .get(token)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}
