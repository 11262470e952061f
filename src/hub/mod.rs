//! Connection registry and fan-out for source and viewer endpoints

mod sink;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

pub use sink::WsSink;

use crate::Result;
use crate::events::{Event, HapticFeedback, unix_timestamp};
use crate::timeline::PhonemeCategory;

/// Confidence below which triggered patterns are softened
pub const LOW_CONFIDENCE: f32 = 0.7;

/// Kind of connected endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Camera / sensor device (the phone)
    Source,
    /// Dashboard
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Viewer => f.write_str("viewer"),
        }
    }
}

/// Opaque handle returned by [`BroadcastHub::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound side of a connection
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Called once before the sink is registered
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint cannot be greeted; it is then not
    /// registered
    async fn handshake(&self, _role: Role) -> Result<()> {
        Ok(())
    }

    /// Deliver one event
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is gone; the hub prunes it
    async fn send(&self, event: &Event) -> Result<()>;
}

struct Connection {
    id: ConnectionId,
    sink: Arc<dyn EventSink>,
    metadata: Option<serde_json::Value>,
}

/// Public view of a registered connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Two independent membership sets with snapshot-then-prune broadcast
#[derive(Default)]
pub struct BroadcastHub {
    sources: RwLock<Vec<Connection>>,
    viewers: RwLock<Vec<Connection>>,
}

impl BroadcastHub {
    /// Create an empty hub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    const fn members(&self, role: Role) -> &RwLock<Vec<Connection>> {
        match role {
            Role::Source => &self.sources,
            Role::Viewer => &self.viewers,
        }
    }

    /// Greet and register a sink
    ///
    /// # Errors
    ///
    /// Returns the handshake error; the sink is not registered
    pub async fn connect(
        &self,
        role: Role,
        sink: Arc<dyn EventSink>,
        metadata: Option<serde_json::Value>,
    ) -> Result<ConnectionId> {
        sink.handshake(role).await?;

        let id = ConnectionId::new();
        let total = {
            let mut members = self.members(role).write().await;
            members.push(Connection { id, sink, metadata });
            members.len()
        };

        tracing::info!(%role, connection_id = %id, total, "endpoint connected");
        Ok(id)
    }

    /// Remove a connection from whichever role holds it
    ///
    /// Returns false if it was already gone.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        for role in [Role::Source, Role::Viewer] {
            let mut members = self.members(role).write().await;
            if let Some(pos) = members.iter().position(|c| c.id == id) {
                members.remove(pos);
                let total = members.len();
                drop(members);
                tracing::info!(%role, connection_id = %id, total, "endpoint disconnected");
                return true;
            }
        }
        false
    }

    /// Send an event to every member of `role`, pruning the ones that fail
    ///
    /// Membership is snapshotted first; concurrent connects and disconnects
    /// never observe a partially iterated set. Returns the number of
    /// successful deliveries.
    pub async fn broadcast(&self, role: Role, event: &Event) -> usize {
        let snapshot: Vec<(ConnectionId, Arc<dyn EventSink>)> = self
            .members(role)
            .read()
            .await
            .iter()
            .map(|c| (c.id, Arc::clone(&c.sink)))
            .collect();

        if snapshot.is_empty() {
            return 0;
        }

        let mut failed = Vec::new();
        let mut delivered = 0;
        for (id, sink) in snapshot {
            match sink.send(event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(%role, connection_id = %id, error = %e, "send failed");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut members = self.members(role).write().await;
            members.retain(|c| !failed.contains(&c.id));
            tracing::info!(
                %role,
                pruned = failed.len(),
                remaining = members.len(),
                "pruned failed connections"
            );
        }

        delivered
    }

    /// Compose haptic feedback for a category and send it to both roles
    ///
    /// Patterns are halved when `confidence` is below [`LOW_CONFIDENCE`].
    pub async fn trigger_haptic(&self, category: PhonemeCategory, confidence: f32) -> Event {
        let event = Event::HapticFeedback(HapticFeedback {
            phoneme_id: None,
            category,
            pattern: scaled_pattern(category.base_pattern(), confidence),
            confidence,
            timestamp: unix_timestamp(),
        });

        self.broadcast(Role::Source, &event).await;
        self.broadcast(Role::Viewer, &event).await;
        event
    }

    /// Number of connections for a role
    pub async fn count(&self, role: Role) -> usize {
        self.members(role).read().await.len()
    }

    /// Snapshot of registered connections for a role
    pub async fn list(&self, role: Role) -> Vec<ConnectionInfo> {
        self.members(role)
            .read()
            .await
            .iter()
            .map(|c| ConnectionInfo {
                id: c.id.to_string(),
                role,
                metadata: c.metadata.clone(),
            })
            .collect()
    }
}

/// Apply the low-confidence softening to a pattern
#[must_use]
pub fn scaled_pattern(base: &[u32], confidence: f32) -> Vec<u32> {
    if confidence < LOW_CONFIDENCE {
        base.iter().map(|ms| ms / 2).collect()
    } else {
        base.to_vec()
    }
}
