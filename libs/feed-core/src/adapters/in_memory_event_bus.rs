use crate::{CoreError, EventPublisher};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Sender};

/// A message published on the in-memory bus.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub topic: String,
    pub event_type: String,
    pub payload: Vec<u8>,
}

/// In-memory implementation of the notification channel using Tokio
/// broadcast channels. Suitable for tests and single-executable mode.
///
/// Broadcast channels drop messages for lagging receivers, so delivery is
/// weaker than a durable queue; consumers of the real bus must be idempotent
/// anyway.
#[derive(Debug, Clone)]
pub struct InMemoryEventBus {
    // Topic name -> broadcast sender. Receivers are created on demand.
    channels: Arc<DashMap<String, Sender<BusMessage>>>,
    channel_capacity: usize,
}

impl InMemoryEventBus {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            channel_capacity,
        }
    }

    fn get_or_create_sender(&self, topic: &str) -> Sender<BusMessage> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(self.channel_capacity);
                sender
            })
            .value()
            .clone()
    }

    /// Subscribe to a topic. Only messages published after the call are
    /// delivered.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.get_or_create_sender(topic).subscribe()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        event_type: &str,
        payload: &[u8],
    ) -> Result<(), CoreError> {
        let sender = self.get_or_create_sender(topic);
        let message = BusMessage {
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload: payload.to_vec(),
        };

        // send() errors only when no receiver is subscribed, which is not a
        // failure for a notification channel.
        let _ = sender.send(message);
        Ok(())
    }
}
