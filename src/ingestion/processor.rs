//! # Batch Ingestion Processor
//!
//! Phase one of the redelivery protocol. For every delivered record the
//! processor extends the message lease, parses the body, and starts one
//! outcome execution. It never acknowledges anything: every identifiable id
//! is returned as a batch item failure so the queue keeps ownership of
//! redelivery timing, while the execution alone decides whether the message
//! is deleted or rearmed.
//!
//! Records are processed concurrently and independently; one record failing
//! does not affect its siblings.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::errors::RecordError;
use super::initializer::ExecutionInitializer;
use super::lease::LeaseExtender;
use super::record::{DeliveredRecord, QueueEvent};
use super::report::BatchReport;
use crate::config::BridgeConfig;
use crate::messaging::{MessageId, QueueProvider};
use crate::workflow::{ExecutionId, ExecutionRequest, WorkflowEngine};

/// What happened to one record of a batch
#[derive(Debug)]
pub enum RecordOutcome {
    /// Lease extended and execution started
    Started {
        message_id: MessageId,
        execution_id: ExecutionId,
    },
    /// Record had no id; excluded from the batch report
    Malformed { index: usize, error: RecordError },
    /// Identifiable record whose lease or execution could not be set up
    Failed {
        message_id: MessageId,
        error: RecordError,
    },
}

impl RecordOutcome {
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::Started { message_id, .. } | Self::Failed { message_id, .. } => Some(message_id),
            Self::Malformed { .. } => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Result of processing one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub report: BatchReport,
    pub records: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn started_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_started()).count()
    }
}

/// Converts delivered batches into workflow executions
#[derive(Debug, Clone)]
pub struct BatchIngestionProcessor {
    queue_url: String,
    lease_extender: LeaseExtender,
    initializer: ExecutionInitializer,
}

impl BatchIngestionProcessor {
    pub fn new(
        queue_url: impl Into<String>,
        lease_extender: LeaseExtender,
        initializer: ExecutionInitializer,
    ) -> Self {
        Self {
            queue_url: queue_url.into(),
            lease_extender,
            initializer,
        }
    }

    pub fn from_config(
        config: &BridgeConfig,
        queue: QueueProvider,
        engine: Arc<dyn WorkflowEngine>,
    ) -> Self {
        Self::new(
            config.source_queue_url.clone(),
            LeaseExtender::new(queue, config.lease_extension()),
            ExecutionInitializer::new(engine, config.state_machine_arn.clone()),
        )
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Process every record of a delivered batch
    #[instrument(skip_all, fields(records = event.len(), queue = %self.queue_url))]
    pub async fn process_batch(&self, event: &QueueEvent) -> BatchOutcome {
        let records = join_all(
            event
                .records
                .iter()
                .enumerate()
                .map(|(index, record)| self.process_record(index, record)),
        )
        .await;

        let mut report = BatchReport::new();
        for outcome in &records {
            match outcome {
                RecordOutcome::Started { .. } => {}
                RecordOutcome::Malformed { index, error } => {
                    warn!(index, error = %error, "Skipping malformed record");
                }
                RecordOutcome::Failed { message_id, error } => {
                    warn!(
                        message_id = %message_id,
                        kind = error.kind(),
                        error = %error,
                        "Record left for queue redelivery"
                    );
                }
            }
            if let Some(message_id) = outcome.message_id() {
                report.record_failure(message_id.clone());
            }
        }

        let outcome = BatchOutcome { report, records };
        info!(
            started = outcome.started_count(),
            reported = outcome.report.len(),
            "Processed batch"
        );
        outcome
    }

    async fn process_record(&self, index: usize, record: &DeliveredRecord) -> RecordOutcome {
        let Some(message_id) = record.message_id.clone() else {
            return RecordOutcome::Malformed {
                index,
                error: RecordError::MalformedRecord {
                    index,
                    field: "messageId",
                },
            };
        };

        match self.ingest(index, message_id.clone(), record).await {
            Ok(execution_id) => RecordOutcome::Started {
                message_id,
                execution_id,
            },
            Err(error) => RecordOutcome::Failed { message_id, error },
        }
    }

    async fn ingest(
        &self,
        index: usize,
        message_id: MessageId,
        record: &DeliveredRecord,
    ) -> Result<ExecutionId, RecordError> {
        let receipt_handle = record
            .receipt_handle
            .clone()
            .ok_or(RecordError::MalformedRecord {
                index,
                field: "receiptHandle",
            })?;

        self.lease_extender
            .extend(&message_id, &self.queue_url, &receipt_handle)
            .await?;

        let data: Value = serde_json::from_str(record.body.as_deref().unwrap_or("{}")).map_err(
            |source| RecordError::MalformedPayload {
                message_id: message_id.clone(),
                source,
            },
        )?;

        let request = ExecutionRequest::new(message_id, &self.queue_url, receipt_handle, data);
        self.initializer.start(&request).await
    }
}
