//! # Queue Consumer
//!
//! Polls the source queue and hands each batch to the ingestion processor,
//! then applies the partial batch response: messages named in
//! `batchItemFailures` are left for the queue to redeliver, all others are
//! deleted.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::ingestion::{BatchIngestionProcessor, BatchOutcome, QueueEvent};
use crate::messaging::{MessagingError, QueueProvider, ReceivedMessage};

/// Counters accumulated over a consumer's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub batches: u64,
    pub records: u64,
    pub executions_started: u64,
    pub acknowledged: u64,
}

/// Receive loop driving the ingestion processor
#[derive(Debug, Clone)]
pub struct QueueConsumer {
    queue: QueueProvider,
    processor: BatchIngestionProcessor,
    batch_size: usize,
    receive_visibility: Duration,
    poll_interval: Duration,
}

impl QueueConsumer {
    pub fn new(
        queue: QueueProvider,
        processor: BatchIngestionProcessor,
        batch_size: usize,
        receive_visibility: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            processor,
            batch_size,
            receive_visibility,
            poll_interval,
        }
    }

    pub fn from_config(
        config: &BridgeConfig,
        queue: QueueProvider,
        processor: BatchIngestionProcessor,
    ) -> Self {
        Self::new(
            queue,
            processor,
            config.batch_size,
            config.receive_visibility(),
            config.poll_interval(),
        )
    }

    /// Receive and process one batch. Returns `None` when the queue had
    /// nothing visible.
    pub async fn poll_once(&self) -> Result<Option<(BatchOutcome, u64)>, MessagingError> {
        let queue_url = self.processor.queue_url();
        let messages = self
            .queue
            .receive_messages(queue_url, self.batch_size, self.receive_visibility)
            .await?;
        if messages.is_empty() {
            return Ok(None);
        }

        let event = QueueEvent::from_messages(&messages);
        let outcome = self.processor.process_batch(&event).await;
        let acknowledged = self.acknowledge_unreported(&messages, &outcome).await;

        Ok(Some((outcome, acknowledged)))
    }

    async fn acknowledge_unreported(
        &self,
        messages: &[ReceivedMessage],
        outcome: &BatchOutcome,
    ) -> u64 {
        let mut acknowledged = 0;
        for message in messages
            .iter()
            .filter(|m| !outcome.report.contains(&m.message_id))
        {
            match self
                .queue
                .delete_message(self.processor.queue_url(), &message.receipt_handle)
                .await
            {
                Ok(()) => acknowledged += 1,
                Err(e) => {
                    warn!(message_id = %message.message_id, error = %e, "Failed to delete acknowledged batch item");
                }
            }
        }
        acknowledged
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        info!(
            queue = %self.processor.queue_url(),
            batch_size = self.batch_size,
            "Starting queue consumer"
        );
        let mut stats = ConsumerStats::default();

        // Shutdown is only observed between polls so a received batch is always finished
        while !*shutdown.borrow() {
            let idle = match self.poll_once().await {
                Ok(Some((outcome, acknowledged))) => {
                    stats.batches += 1;
                    stats.records += outcome.records.len() as u64;
                    stats.executions_started += outcome.started_count() as u64;
                    stats.acknowledged += acknowledged;
                    false
                }
                Ok(None) => true,
                Err(e) => {
                    error!(error = %e, "Error receiving batch");
                    true
                }
            };

            if idle {
                debug!(delay_ms = self.poll_interval.as_millis() as u64, "Queue idle");
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        info!(
            batches = stats.batches,
            records = stats.records,
            "Queue consumer stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{ExecutionInitializer, LeaseExtender};
    use crate::workflow::{ExecutionId, LocalWorkflowEngine, WorkflowEngine, WorkflowError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    /// Engine whose start call takes a second to return
    struct SlowEngine;

    #[async_trait]
    impl WorkflowEngine for SlowEngine {
        async fn start_execution(
            &self,
            definition: &str,
            _input: Value,
        ) -> Result<ExecutionId, WorkflowError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(ExecutionId::generate(definition))
        }
    }

    const QUEUE: &str = "source-queue";

    #[tokio::test]
    async fn test_poll_once_on_empty_queue() {
        let (provider, _service) = QueueProvider::in_memory();
        provider.ensure_queue(QUEUE).await.unwrap();
        let processor = BatchIngestionProcessor::new(
            QUEUE,
            LeaseExtender::with_default_lease(provider.clone()),
            ExecutionInitializer::new(Arc::new(LocalWorkflowEngine::new()), "missing"),
        );
        let consumer = QueueConsumer::from_config(&BridgeConfig::default(), provider, processor);

        assert!(consumer.poll_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reported_items_are_not_deleted() {
        let (provider, service) = QueueProvider::in_memory();
        provider.ensure_queue(QUEUE).await.unwrap();
        provider.send_message(QUEUE, "{}").await.unwrap();
        // No definition registered: the record fails to start and is still reported
        let processor = BatchIngestionProcessor::new(
            QUEUE,
            LeaseExtender::with_default_lease(provider.clone()),
            ExecutionInitializer::new(Arc::new(LocalWorkflowEngine::new()), "missing"),
        );
        let consumer = QueueConsumer::from_config(&BridgeConfig::default(), provider, processor);

        let (outcome, acknowledged) = consumer.poll_once().await.unwrap().unwrap();
        assert_eq!(outcome.report.len(), 1);
        assert_eq!(acknowledged, 0);
        assert_eq!(service.queue_length(QUEUE).await, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (provider, _service) = QueueProvider::in_memory();
        provider.ensure_queue(QUEUE).await.unwrap();
        let processor = BatchIngestionProcessor::new(
            QUEUE,
            LeaseExtender::with_default_lease(provider.clone()),
            ExecutionInitializer::new(Arc::new(LocalWorkflowEngine::new()), "missing"),
        );
        let consumer = QueueConsumer::from_config(&BridgeConfig::default(), provider, processor);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { consumer.run(rx).await });
        tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert_eq!(stats.batches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_received_batch_finish() {
        let (provider, service) = QueueProvider::in_memory();
        provider.ensure_queue(QUEUE).await.unwrap();
        provider.send_message(QUEUE, "{}").await.unwrap();
        let processor = BatchIngestionProcessor::new(
            QUEUE,
            LeaseExtender::with_default_lease(provider.clone()),
            ExecutionInitializer::new(Arc::new(SlowEngine), "outcome"),
        );
        let consumer = QueueConsumer::from_config(&BridgeConfig::default(), provider, processor);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { consumer.run(rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.executions_started, 1);
        // Reported, so left for the decision phase under the extended lease
        let snapshot = service.snapshot(QUEUE).await;
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].invisible_for.unwrap() > Duration::from_secs(200));
    }
}
