//! # Queue Provider Enum
//!
//! Enum dispatch over the queue providers, avoiding trait object overhead on
//! the lease and delete hot path.

use std::sync::Arc;
use std::time::Duration;

use super::providers::InMemoryQueueService;
#[cfg(feature = "postgres")]
use super::providers::PgmqQueueService;
use super::traits::QueueService;
use super::types::{MessageId, QueueStats, ReceiptHandle, ReceivedMessage, RedrivePolicy};
use super::MessagingError;

/// Provider enum for zero-cost dispatch
///
/// # Variants
///
/// - `InMemory` - In-memory queues, shared through an `Arc` so callers can keep
///   an inspection handle
/// - `Pgmq` - PostgreSQL Message Queue
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tasker_queue_bridge::messaging::{InMemoryQueueService, QueueProvider};
///
/// let provider = QueueProvider::InMemory(Arc::new(InMemoryQueueService::new()));
/// assert_eq!(provider.provider_name(), "in_memory");
/// ```
#[derive(Debug, Clone)]
pub enum QueueProvider {
    InMemory(Arc<InMemoryQueueService>),
    #[cfg(feature = "postgres")]
    Pgmq(PgmqQueueService),
}

impl QueueProvider {
    /// Build an in-memory provider, returning the service handle alongside it
    pub fn in_memory() -> (Self, Arc<InMemoryQueueService>) {
        let service = Arc::new(InMemoryQueueService::new());
        (Self::InMemory(Arc::clone(&service)), service)
    }

    /// Get the provider name for logging
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::InMemory(s) => s.provider_name(),
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.provider_name(),
        }
    }

    /// Create a queue if it doesn't exist
    pub async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.ensure_queue(queue_name).await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.ensure_queue(queue_name).await,
        }
    }

    /// Attach a redrive policy to a source queue
    pub async fn set_redrive_policy(
        &self,
        queue_name: &str,
        policy: RedrivePolicy,
    ) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.set_redrive_policy(queue_name, policy).await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.set_redrive_policy(queue_name, policy).await,
        }
    }

    /// Send a raw message body
    pub async fn send_message(
        &self,
        queue_name: &str,
        body: &str,
    ) -> Result<MessageId, MessagingError> {
        match self {
            Self::InMemory(s) => s.send_message(queue_name, body).await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.send_message(queue_name, body).await,
        }
    }

    /// Receive and lease a batch of messages
    pub async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, MessagingError> {
        match self {
            Self::InMemory(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
        }
    }

    /// Reset a message's lease to `timeout` from now
    pub async fn extend_visibility(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => {
                s.extend_visibility(queue_name, receipt_handle, timeout)
                    .await
            }
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => {
                s.extend_visibility(queue_name, receipt_handle, timeout)
                    .await
            }
        }
    }

    /// Permanently delete a message
    pub async fn delete_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.delete_message(queue_name, receipt_handle).await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.delete_message(queue_name, receipt_handle).await,
        }
    }

    /// Get queue statistics
    pub async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        match self {
            Self::InMemory(s) => s.queue_stats(queue_name).await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.queue_stats(queue_name).await,
        }
    }

    /// Health check
    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::InMemory(s) => s.health_check().await,
            #[cfg(feature = "postgres")]
            Self::Pgmq(s) => s.health_check().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_dispatch() {
        let (provider, service) = QueueProvider::in_memory();
        provider.ensure_queue("q").await.unwrap();
        provider.send_message("q", "{}").await.unwrap();

        assert_eq!(service.queue_length("q").await, 1);
        assert!(provider.health_check().await.unwrap());
        assert_eq!(provider.queue_stats("q").await.unwrap().message_count, 1);
    }
}
