#![allow(dead_code)]

use std::sync::Arc;

use tasker_queue_bridge::bootstrap::BridgeSystem;
use tasker_queue_bridge::config::BridgeConfig;
use tasker_queue_bridge::ingestion::QueueEvent;
use tasker_queue_bridge::messaging::{InMemoryQueueService, QueueProvider, ReceivedMessage};

/// A bootstrapped bridge over in-memory queues
pub struct Harness {
    pub bridge: BridgeSystem,
    pub service: Arc<InMemoryQueueService>,
}

pub async fn harness() -> Harness {
    harness_with(BridgeConfig::default()).await
}

pub async fn harness_with(config: BridgeConfig) -> Harness {
    let (queue, service) = QueueProvider::in_memory();
    let bridge = BridgeSystem::bootstrap(config, queue)
        .await
        .expect("bridge bootstrap");
    Harness { bridge, service }
}

impl Harness {
    pub fn source(&self) -> &str {
        &self.bridge.config.source_queue_url
    }

    pub fn dead_letter(&self) -> &str {
        &self.bridge.config.dead_letter_queue_url
    }

    pub async fn send(&self, bodies: &[&str]) {
        for body in bodies {
            self.bridge
                .queue
                .send_message(self.source(), body)
                .await
                .expect("send message");
        }
    }

    /// Receive up to `max` visible messages the way the queue's delivery would
    pub async fn receive(&self, max: usize) -> Vec<ReceivedMessage> {
        self.bridge
            .queue
            .receive_messages(self.source(), max, self.bridge.config.receive_visibility())
            .await
            .expect("receive messages")
    }

    /// Send `bodies` and receive them back as one delivery event
    pub async fn deliver(&self, bodies: &[&str]) -> QueueEvent {
        self.send(bodies).await;
        QueueEvent::from_messages(&self.receive(bodies.len()).await)
    }

    pub async fn source_length(&self) -> usize {
        self.service.queue_length(self.source()).await
    }

    pub async fn dead_letter_length(&self) -> usize {
        self.service.queue_length(self.dead_letter()).await
    }
}
