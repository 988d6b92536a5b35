//! Same-device mirror: every published snapshot and status change, in publish order.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Broadcast hub behind `/sse/mirror`. Events sent while nobody listens are dropped.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Hub whose slowest listener may fall `capacity` events behind before lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Listen to events broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Forward an already encoded event.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Encode `payload` as the data of a `name` event and broadcast it.
    pub fn broadcast_json<T: Serialize>(&self, name: &str, payload: &T) {
        match ServerEvent::json(Some(name.to_string()), payload) {
            Ok(event) => self.broadcast(event),
            Err(err) => warn!(event = name, error = %err, "failed to encode mirror event"),
        }
    }
}
