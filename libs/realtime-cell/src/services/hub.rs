use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::models::{EventKind, RealtimeEvent, Topic};

pub type TopicSender = broadcast::Sender<String>;
pub type TopicReceiver = broadcast::Receiver<String>;

const DEFAULT_TOPIC_CAPACITY: usize = 100;

/// Topic-scoped fan-out. Each topic gets its own broadcast channel, created
/// on first subscription and dropped once nobody listens.
#[derive(Clone)]
pub struct RealtimeHub {
    channels: Arc<RwLock<HashMap<Topic, TopicSender>>>,
    capacity: usize,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> TopicReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!("New subscriber on topic {}", topic);
        sender.subscribe()
    }

    /// Publishes an event to one topic and returns how many subscribers got it.
    pub async fn publish<T: Serialize>(&self, topic: Topic, event: EventKind, data: &T) -> usize {
        let payload = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize {:?} event for {}: {}", event, topic, e);
                return 0;
            }
        };

        let message = RealtimeEvent {
            event,
            topic: topic.to_string(),
            timestamp: Utc::now(),
            data: payload,
        };

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {:?} event for {}: {}", event, topic, e);
                return 0;
            }
        };

        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&topic) {
                Some(sender) => sender.send(text).unwrap_or(0),
                None => 0,
            }
        };

        if delivered == 0 {
            self.prune(topic).await;
        }

        debug!("Published {:?} on {} to {} subscribers", event, topic, delivered);
        delivered
    }

    pub async fn active_topics(&self) -> Vec<Topic> {
        let channels = self.channels.read().await;
        channels.keys().copied().collect()
    }

    async fn prune(&self, topic: Topic) {
        let mut channels = self.channels.write().await;
        if channels.get(&topic).is_some_and(|sender| sender.receiver_count() == 0) {
            channels.remove(&topic);
            debug!("Dropped idle topic {}", topic);
        }
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
