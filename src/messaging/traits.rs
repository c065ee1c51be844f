//! # Queue Service Trait
//!
//! Provider-agnostic queue operations. The bridge consumes only
//! `extend_visibility` and `delete_message` on the protocol path; the
//! remaining operations serve the delivery loop, tooling and tests.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueueStats, ReceiptHandle, ReceivedMessage};
use super::MessagingError;

/// Core queue service trait
///
/// Implementations must support visibility-timeout leases: a received
/// message stays invisible to other consumers until its lease expires, is
/// extended, or the message is deleted.
#[async_trait]
pub trait QueueService: Send + Sync + 'static {
    /// Create a queue if it doesn't exist (idempotent)
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Send a raw message body to a queue
    async fn send_message(&self, queue_name: &str, body: &str)
        -> Result<MessageId, MessagingError>;

    /// Receive up to `max_messages` visible messages, leasing each for `visibility_timeout`
    ///
    /// Providers apply the queue's redrive policy here: messages that have
    /// exhausted their receive count are dead-lettered rather than returned.
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, MessagingError>;

    /// Set the message's remaining lease to `timeout`, measured from now
    ///
    /// This is an absolute reset, not an increment: a short timeout makes
    /// the message visible again quickly.
    async fn extend_visibility(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), MessagingError>;

    /// Permanently delete a message
    async fn delete_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError>;

    /// Get queue statistics
    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Health check - verify the backend is reachable
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
