//! # Bridge Bootstrap
//!
//! Wires the queue provider, the local workflow engine, the outcome state
//! machine and the ingestion processor together from a `BridgeConfig`, and
//! manages the consumer loop's lifecycle.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::delivery::{ConsumerStats, QueueConsumer};
use crate::error::Result;
use crate::ingestion::{BatchIngestionProcessor, BatchOutcome, QueueEvent};
use crate::messaging::{QueueProvider, QueueStats};
use crate::state_machine::OutcomeStateMachine;
use crate::workflow::LocalWorkflowEngine;

/// A fully wired bridge
#[derive(Debug, Clone)]
pub struct BridgeSystem {
    pub config: BridgeConfig,
    pub queue: QueueProvider,
    pub engine: Arc<LocalWorkflowEngine>,
    pub processor: BatchIngestionProcessor,
}

impl BridgeSystem {
    /// Create the queues, attach the redrive policy and register the outcome
    /// state machine under `config.state_machine_arn`
    pub async fn bootstrap(config: BridgeConfig, queue: QueueProvider) -> Result<Self> {
        config.validate()?;

        queue.ensure_queue(&config.source_queue_url).await?;
        queue.ensure_queue(&config.dead_letter_queue_url).await?;
        queue
            .set_redrive_policy(&config.source_queue_url, config.redrive_policy())
            .await?;

        let engine = Arc::new(LocalWorkflowEngine::new().with_history(config.execution_history));
        let outcome = OutcomeStateMachine::new(queue.clone())
            .with_name(config.state_machine_arn.clone())
            .with_rearm_visibility(config.rearm_visibility())
            .with_timeout(config.execution_timeout());
        engine.register(Arc::new(outcome))?;

        let processor = BatchIngestionProcessor::from_config(&config, queue.clone(), engine.clone());

        info!(
            provider = queue.provider_name(),
            source_queue = %config.source_queue_url,
            dead_letter_queue = %config.dead_letter_queue_url,
            max_receive_count = config.max_receive_count,
            "Bridge bootstrapped"
        );

        Ok(Self {
            config,
            queue,
            engine,
            processor,
        })
    }

    /// Process one externally delivered batch
    pub async fn handle(&self, event: &QueueEvent) -> BatchOutcome {
        self.processor.process_batch(event).await
    }

    pub fn consumer(&self) -> QueueConsumer {
        QueueConsumer::from_config(&self.config, self.queue.clone(), self.processor.clone())
    }

    /// Spawn the consumer loop
    pub fn start(&self) -> BridgeHandle {
        let (shutdown_sender, shutdown) = watch::channel(false);
        let consumer = self.consumer();
        let consumer_task = tokio::spawn(async move { consumer.run(shutdown).await });

        BridgeHandle {
            shutdown_sender,
            consumer_task: Some(consumer_task),
            engine: Arc::clone(&self.engine),
        }
    }

    pub async fn status(&self) -> Result<BridgeStatus> {
        Ok(BridgeStatus {
            provider: self.queue.provider_name(),
            healthy: self.queue.health_check().await?,
            source_queue: self.queue.queue_stats(&self.config.source_queue_url).await?,
            dead_letter_queue: self
                .queue
                .queue_stats(&self.config.dead_letter_queue_url)
                .await?,
            running_executions: self.engine.running_count(),
        })
    }
}

/// Point-in-time view of a running bridge
#[derive(Debug, Clone)]
pub struct BridgeStatus {
    pub provider: &'static str,
    pub healthy: bool,
    pub source_queue: QueueStats,
    pub dead_letter_queue: QueueStats,
    pub running_executions: usize,
}

/// Lifecycle handle for a started consumer loop
#[derive(Debug)]
pub struct BridgeHandle {
    shutdown_sender: watch::Sender<bool>,
    consumer_task: Option<JoinHandle<ConsumerStats>>,
    engine: Arc<LocalWorkflowEngine>,
}

impl BridgeHandle {
    pub fn is_running(&self) -> bool {
        self.consumer_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop polling, then wait for in-flight executions to finish
    pub async fn stop(mut self) -> ConsumerStats {
        if self.shutdown_sender.send(true).is_err() {
            warn!("Consumer loop already stopped");
        }

        let stats = match self.consumer_task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Consumer task ended abnormally");
                ConsumerStats::default()
            }),
            None => ConsumerStats::default(),
        };
        self.engine.wait_for_all().await;

        info!(batches = stats.batches, records = stats.records, "Bridge stopped");
        stats
    }
}
