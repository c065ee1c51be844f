use std::time::Duration;

use tracing::{debug, instrument};

use super::errors::RecordError;
use crate::constants::DEFAULT_LEASE_EXTENSION_SECONDS;
use crate::messaging::{MessageId, QueueProvider, ReceiptHandle};

/// Places the ingestion lease on a delivered message
///
/// The lease must outlast the workflow execution timeout, otherwise the queue
/// may redeliver the message while its execution is still deciding.
#[derive(Debug, Clone)]
pub struct LeaseExtender {
    queue: QueueProvider,
    lease: Duration,
}

impl LeaseExtender {
    pub fn new(queue: QueueProvider, lease: Duration) -> Self {
        Self { queue, lease }
    }

    pub fn with_default_lease(queue: QueueProvider) -> Self {
        Self::new(queue, Duration::from_secs(DEFAULT_LEASE_EXTENSION_SECONDS))
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Reset the message's visibility to the configured lease from now
    #[instrument(skip(self, receipt_handle), fields(lease_seconds = self.lease.as_secs()))]
    pub async fn extend(
        &self,
        message_id: &MessageId,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), RecordError> {
        self.queue
            .extend_visibility(queue_url, receipt_handle, self.lease)
            .await
            .map_err(|source| RecordError::LeaseExtension {
                message_id: message_id.clone(),
                source,
            })?;

        debug!("Extended message lease");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_extend_sets_full_lease() {
        let (provider, service) = QueueProvider::in_memory();
        provider.ensure_queue("q").await.unwrap();
        provider.send_message("q", "{}").await.unwrap();
        let message = provider
            .receive_messages("q", 1, Duration::from_secs(30))
            .await
            .unwrap()
            .remove(0);

        let extender = LeaseExtender::with_default_lease(provider);
        extender
            .extend(&message.message_id, "q", &message.receipt_handle)
            .await
            .unwrap();

        assert_eq!(
            service.snapshot("q").await[0].invisible_for,
            Some(Duration::from_secs(300))
        );
    }

    #[tokio::test]
    async fn test_extend_unknown_queue_fails() {
        let (provider, _service) = QueueProvider::in_memory();
        let extender = LeaseExtender::with_default_lease(provider);

        let err = extender
            .extend(&MessageId::from("1"), "missing", &ReceiptHandle::from("1-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "lease_extension");
    }
}
