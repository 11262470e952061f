//! WebSocket-backed event sink

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{EventSink, Role};
use crate::events::Event;
use crate::{Error, Result};

/// How long a broadcast waits on a slow socket before treating it as gone
const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Queues serialized events for a socket's writer task
#[derive(Debug, Clone)]
pub struct WsSink {
    tx: mpsc::Sender<String>,
}

impl WsSink {
    /// Create a sink and the receiver its writer task drains
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for WsSink {
    async fn handshake(&self, role: Role) -> Result<()> {
        self.send(&Event::Welcome { role }).await
    }

    async fn send(&self, event: &Event) -> Result<()> {
        let text = serde_json::to_string(event)?;
        self.tx
            .send_timeout(text, SEND_TIMEOUT)
            .await
            .map_err(|e| Error::Transport(format!("socket writer unavailable: {e}")))
    }
}
