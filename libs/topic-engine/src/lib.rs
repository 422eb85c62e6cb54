pub mod error;
pub mod log;
pub mod subscriber;
pub mod topic;
pub mod transport;

use std::sync::Arc;

pub use error::{DeliveryError, LogError, TopicError, TransportError};
pub use log::DurableLog;
pub use subscriber::{Subscriber, SubscriberRegistry};
pub use topic::{SessionEnd, Topic};
pub use transport::{BoxFuture, Transport};

// ═══════════════════════════════════════════════════════════════
//  TopicRegistry
// ═══════════════════════════════════════════════════════════════

/// Все topic'и процесса: собираются на старте, закрываются на shutdown.
#[derive(Default)]
pub struct TopicRegistry {
    topics: Vec<Arc<Topic>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, topic: Topic) -> Arc<Topic> {
        let topic = Arc::new(topic);
        self.topics.push(topic.clone());
        topic
    }

    /// Завершить live-сессии всех topic'ов.
    pub fn close_all(&self) {
        for topic in &self.topics {
            topic.close();
        }
    }
}
