//! # In-Memory Queue Service
//!
//! Thread-safe in-memory queue implementation for local runs and tests.
//!
//! ## Features
//!
//! - **Visibility Leases**: Received messages are invisible until their lease
//!   expires, is reset through `extend_visibility`, or they are deleted
//! - **Per-Delivery Receipt Handles**: Each receive hands out a new handle;
//!   lease changes with a superseded handle are rejected
//! - **Redrive**: Messages that exhausted their receive count move to the
//!   configured dead-letter queue on the next receive attempt
//! - **Tokio Clock**: Leases are measured with `tokio::time::Instant`, so
//!   paused-time tests can drive expiry deterministically

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::messaging::traits::QueueService;
use crate::messaging::types::{
    MessageId, QueueStats, ReceiptHandle, ReceivedMessage, RedrivePolicy,
};
use crate::messaging::MessagingError;

/// Upper bound on a single lease, matching the common managed-queue limit of 12 hours
pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone)]
struct InMemoryMessage {
    id: u64,
    body: String,
    enqueued_at: DateTime<Utc>,
    enqueued_instant: Instant,
    /// When the message becomes visible again (None = visible now)
    visible_at: Option<Instant>,
    receive_count: u32,
}

impl InMemoryMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.visible_at.map(|vt| vt <= now).unwrap_or(true)
    }

    fn current_handle(&self) -> ReceiptHandle {
        ReceiptHandle::new(format!("{}-{}", self.id, self.receive_count))
    }
}

#[derive(Debug, Default)]
struct InMemoryQueue {
    messages: VecDeque<InMemoryMessage>,
    redrive: Option<RedrivePolicy>,
    total_sent: u64,
    total_received: u64,
    total_deleted: u64,
    dead_lettered: u64,
}

/// Point-in-time view of a queued message, for inspection in tests and tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSnapshot {
    pub message_id: MessageId,
    pub body: String,
    pub receive_count: u32,
    /// Remaining lease, `None` when the message is visible
    pub invisible_for: Option<Duration>,
}

impl MessageSnapshot {
    pub fn is_visible(&self) -> bool {
        self.invisible_for.is_none()
    }
}

/// In-memory queue service
///
/// # Example
///
/// ```rust
/// use tasker_queue_bridge::messaging::{InMemoryQueueService, QueueService, RedrivePolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = InMemoryQueueService::new();
/// service.ensure_queue("source-queue").await?;
/// service
///     .set_redrive_policy("source-queue", RedrivePolicy::new("dlq-for-source-queue", 1))
///     .await?;
///
/// service.send_message("source-queue", r#"{"order": 1}"#).await?;
/// let messages = service
///     .receive_messages("source-queue", 10, Duration::from_secs(30))
///     .await?;
/// service
///     .delete_message("source-queue", &messages[0].receipt_handle)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryQueueService {
    queues: RwLock<HashMap<String, InMemoryQueue>>,
    /// Message ids are unique across queues so they survive a redrive unchanged
    next_id: AtomicU64,
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueService {
    /// Create a new in-memory queue service
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create with pre-initialized queues
    pub fn with_queues(queue_names: &[&str]) -> Self {
        let queues = queue_names
            .iter()
            .map(|name| (name.to_string(), InMemoryQueue::default()))
            .collect();
        Self {
            queues: RwLock::new(queues),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a redrive policy to a source queue, creating both queues if needed
    pub async fn set_redrive_policy(
        &self,
        queue_name: &str,
        policy: RedrivePolicy,
    ) -> Result<(), MessagingError> {
        if policy.max_receive_count == 0 {
            return Err(MessagingError::queue_operation(
                queue_name,
                "set_redrive_policy",
                "max_receive_count must be at least 1",
            ));
        }

        let mut queues = self.queues.write().await;
        queues
            .entry(policy.dead_letter_queue.clone())
            .or_default();
        queues.entry(queue_name.to_string()).or_default().redrive = Some(policy);
        Ok(())
    }

    /// Number of messages in a queue, visible or not
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }

    /// Snapshot every message currently held by a queue
    pub async fn snapshot(&self, queue_name: &str) -> Vec<MessageSnapshot> {
        let queues = self.queues.read().await;
        let now = Instant::now();
        queues
            .get(queue_name)
            .map(|q| {
                q.messages
                    .iter()
                    .map(|m| MessageSnapshot {
                        message_id: MessageId::from(m.id),
                        body: m.body.clone(),
                        receive_count: m.receive_count,
                        invisible_for: m
                            .visible_at
                            .filter(|vt| *vt > now)
                            .map(|vt| vt.duration_since(now)),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_handle(handle: &ReceiptHandle) -> Result<(u64, u32), MessagingError> {
        handle
            .as_str()
            .split_once('-')
            .and_then(|(id, attempt)| Some((id.parse().ok()?, attempt.parse().ok()?)))
            .ok_or_else(|| MessagingError::invalid_receipt_handle(handle.as_str()))
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        queues.entry(queue_name.to_string()).or_default();
        Ok(())
    }

    async fn send_message(
        &self,
        queue_name: &str,
        body: &str,
    ) -> Result<MessageId, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        queue.messages.push_back(InMemoryMessage {
            id,
            body: body.to_string(),
            enqueued_at: Utc::now(),
            enqueued_instant: Instant::now(),
            visible_at: None,
            receive_count: 0,
        });
        queue.total_sent += 1;

        Ok(MessageId::from(id))
    }

    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, MessagingError> {
        if visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(MessagingError::InvalidVisibilityTimeout {
                seconds: visibility_timeout.as_secs(),
                max_seconds: MAX_VISIBILITY_TIMEOUT.as_secs(),
            });
        }

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Instant::now();
        let redrive = queue.redrive.clone();
        let mut received = Vec::new();
        let mut dead_letters = Vec::new();

        let mut idx = 0;
        while idx < queue.messages.len() && received.len() < max_messages {
            if !queue.messages[idx].is_visible(now) {
                idx += 1;
                continue;
            }

            let exhausted = redrive
                .as_ref()
                .is_some_and(|policy| policy.exhausted(queue.messages[idx].receive_count));
            if exhausted {
                if let Some(msg) = queue.messages.remove(idx) {
                    dead_letters.push(msg);
                }
                continue;
            }

            let msg = &mut queue.messages[idx];
            msg.receive_count += 1;
            msg.visible_at = Some(now + visibility_timeout);
            received.push(ReceivedMessage {
                message_id: MessageId::from(msg.id),
                receipt_handle: msg.current_handle(),
                body: msg.body.clone(),
                receive_count: msg.receive_count,
                enqueued_at: msg.enqueued_at,
            });
            idx += 1;
        }

        queue.total_received += received.len() as u64;
        queue.dead_lettered += dead_letters.len() as u64;

        if let Some(policy) = redrive.filter(|_| !dead_letters.is_empty()) {
            let dlq = queues.entry(policy.dead_letter_queue.clone()).or_default();
            for mut msg in dead_letters {
                warn!(
                    queue = %queue_name,
                    dead_letter_queue = %policy.dead_letter_queue,
                    message_id = msg.id,
                    receive_count = msg.receive_count,
                    "Max receive count exhausted, moving message to dead-letter queue"
                );
                msg.visible_at = None;
                msg.receive_count = 0;
                dlq.messages.push_back(msg);
                dlq.total_sent += 1;
            }
        }

        debug!(queue = %queue_name, count = received.len(), "Received messages");
        Ok(received)
    }

    async fn extend_visibility(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), MessagingError> {
        if timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(MessagingError::InvalidVisibilityTimeout {
                seconds: timeout.as_secs(),
                max_seconds: MAX_VISIBILITY_TIMEOUT.as_secs(),
            });
        }

        let (message_id, attempt) = Self::parse_handle(receipt_handle)?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Instant::now();
        let msg = queue
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| MessagingError::message_not_found(message_id.to_string()))?;

        if msg.receive_count != attempt {
            return Err(MessagingError::not_in_flight(
                message_id.to_string(),
                format!(
                    "receipt handle is from delivery {attempt}, current delivery is {}",
                    msg.receive_count
                ),
            ));
        }
        if msg.is_visible(now) {
            return Err(MessagingError::not_in_flight(
                message_id.to_string(),
                "lease has expired",
            ));
        }

        msg.visible_at = Some(now + timeout);
        Ok(())
    }

    async fn delete_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        // Deletes are accepted from any delivery's handle, only lease changes are strict
        let (message_id, _) = Self::parse_handle(receipt_handle)?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let pos = queue
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| MessagingError::message_not_found(message_id.to_string()))?;
        queue.messages.remove(pos);
        queue.total_deleted += 1;
        Ok(())
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Instant::now();
        let in_flight = queue
            .messages
            .iter()
            .filter(|m| !m.is_visible(now))
            .count() as u64;

        let mut stats = QueueStats::new(queue_name, queue.messages.len() as u64)
            .with_in_flight_count(in_flight)
            .with_dead_lettered(queue.dead_lettered)
            .with_counters(queue.total_sent, queue.total_received, queue.total_deleted);

        if let Some(oldest) = queue.messages.iter().map(|m| m.enqueued_instant).min() {
            stats = stats.with_oldest_message_age(now.duration_since(oldest));
        }

        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
