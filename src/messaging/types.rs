//! # Messaging Types
//!
//! Core types shared by every queue provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier for a queued message
///
/// The format is provider-specific:
/// - PGMQ: i64 message ID as string
/// - InMemory: monotonically increasing u64 as string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque lease handle for extending or deleting a received message
///
/// The format is provider-specific:
/// - PGMQ: msg_id as string (PGMQ leases are keyed by message id)
/// - InMemory: `{message_id}-{receive_count}`, unique per delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    /// Create a new receipt handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Try to parse the receipt handle as an i64 (for PGMQ compatibility)
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ReceiptHandle {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReceiptHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// A message delivered from a queue together with its lease
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Provider-assigned message id, stable across redeliveries
    pub message_id: MessageId,

    /// Lease handle for this particular delivery
    pub receipt_handle: ReceiptHandle,

    /// Raw message body
    pub body: String,

    /// Number of times this message has been received, including this delivery
    pub receive_count: u32,

    /// When the message was originally enqueued
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

/// Dead-letter routing attached to a source queue
///
/// Once a message has been received `max_receive_count` times without being
/// deleted, the next receive attempt moves it to `dead_letter_queue` instead
/// of delivering it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedrivePolicy {
    pub dead_letter_queue: String,
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn new(dead_letter_queue: impl Into<String>, max_receive_count: u32) -> Self {
        Self {
            dead_letter_queue: dead_letter_queue.into(),
            max_receive_count,
        }
    }

    /// Whether a message that has been received `receive_count` times must be dead-lettered
    /// instead of delivered again
    pub fn exhausted(&self, receive_count: u32) -> bool {
        receive_count >= self.max_receive_count
    }
}

/// Queue statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Queue name
    pub queue_name: String,

    /// Total number of messages in the queue (visible + in flight)
    pub message_count: u64,

    /// Number of messages currently leased (invisible)
    pub in_flight_count: Option<u64>,

    /// Age of the oldest message in the queue
    pub oldest_message_age: Option<Duration>,

    /// Messages moved to the dead-letter queue from this queue
    pub dead_lettered: u64,

    /// Lifetime counters, when the provider tracks them
    pub total_sent: u64,
    pub total_received: u64,
    pub total_deleted: u64,
}

impl QueueStats {
    /// Create new queue stats
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            ..Default::default()
        }
    }

    /// Set the in-flight count
    pub fn with_in_flight_count(mut self, count: u64) -> Self {
        self.in_flight_count = Some(count);
        self
    }

    /// Set the oldest message age
    pub fn with_oldest_message_age(mut self, age: Duration) -> Self {
        self.oldest_message_age = Some(age);
        self
    }

    /// Set lifetime counters
    pub fn with_counters(mut self, sent: u64, received: u64, deleted: u64) -> Self {
        self.total_sent = sent;
        self.total_received = received;
        self.total_deleted = deleted;
        self
    }

    /// Set the dead-lettered counter
    pub fn with_dead_lettered(mut self, count: u64) -> Self {
        self.dead_lettered = count;
        self
    }
}
