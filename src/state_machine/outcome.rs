//! # Outcome State Machine
//!
//! The decision phase of the redelivery protocol. One execution is started
//! per ingested message; it branches on whether `metadata.failed` is present
//! in its input and either rearms the message with a short visibility timeout
//! or deletes it. Both terminal states end the execution successfully.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::definition::render_definition;
use super::events::OutcomeEvent;
use super::states::OutcomeState;
use crate::constants::{
    workflows, DEFAULT_EXECUTION_TIMEOUT_SECONDS, DEFAULT_REARM_VISIBILITY_SECONDS,
};
use crate::logging::log_queue_operation;
use crate::messaging::{MessageId, MessagingError, QueueProvider, ReceiptHandle};
use crate::workflow::{WorkflowDefinition, WorkflowError};

/// Output document of a completed outcome execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub message_id: MessageId,
    pub queue_url: String,
    pub terminal_state: OutcomeState,
}

/// The part of `metadata` the terminal actions need. The failure flag is read
/// by presence only, so its type never matters here.
#[derive(Debug, Deserialize)]
struct QueueCoordinates {
    message_id: MessageId,
    #[serde(rename = "sqs_queue_url")]
    queue_url: String,
    #[serde(rename = "sqs_receipt_handle")]
    receipt_handle: ReceiptHandle,
}

impl QueueCoordinates {
    fn from_input(input: &Value) -> Result<Self, WorkflowError> {
        let metadata = input
            .get("metadata")
            .ok_or_else(|| WorkflowError::invalid_input("input has no metadata"))?;
        Self::deserialize(metadata).map_err(|e| WorkflowError::invalid_input(e.to_string()))
    }
}

/// Rearm-or-acknowledge workflow bound to a queue provider
#[derive(Debug, Clone)]
pub struct OutcomeStateMachine {
    name: String,
    queue: QueueProvider,
    rearm_visibility: Duration,
    timeout: Duration,
}

impl OutcomeStateMachine {
    pub fn new(queue: QueueProvider) -> Self {
        Self {
            name: workflows::OUTCOME_STATE_MACHINE.to_string(),
            queue,
            rearm_visibility: Duration::from_secs(DEFAULT_REARM_VISIBILITY_SECONDS),
            timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECONDS),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rearm_visibility(mut self, rearm_visibility: Duration) -> Self {
        self.rearm_visibility = rearm_visibility;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Terminal state an execution with this input will reach
    pub fn decide(input: &Value) -> OutcomeState {
        match OutcomeEvent::from_input(input) {
            OutcomeEvent::FailureFlagged => OutcomeState::Rearm,
            OutcomeEvent::FailureAbsent => OutcomeState::Acknowledge,
        }
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        current: OutcomeState,
        event: OutcomeEvent,
    ) -> Result<OutcomeState, WorkflowError> {
        match (current, event) {
            (OutcomeState::Decide, OutcomeEvent::FailureFlagged) => Ok(OutcomeState::Rearm),
            (OutcomeState::Decide, OutcomeEvent::FailureAbsent) => Ok(OutcomeState::Acknowledge),
            (state, event) => Err(WorkflowError::internal(format!(
                "No transition from {state} on {}",
                event.event_type()
            ))),
        }
    }

    /// Run the decision against the queue and report the terminal state
    pub async fn execute(&self, input: &Value) -> Result<OutcomeReport, WorkflowError> {
        let event = OutcomeEvent::from_input(input);
        let metadata = QueueCoordinates::from_input(input)?;

        let target = Self::determine_target_state(OutcomeState::Decide, event)?;
        match target {
            OutcomeState::Rearm => {
                self.queue
                    .extend_visibility(
                        &metadata.queue_url,
                        &metadata.receipt_handle,
                        self.rearm_visibility,
                    )
                    .await
                    .map_err(|e| Self::terminal_action_failed("rearm", &metadata, e))?;
                log_queue_operation(
                    "rearm",
                    &metadata.queue_url,
                    Some(metadata.message_id.as_str()),
                    "visibility_changed",
                    Some(&format!("visible in {}s", self.rearm_visibility.as_secs())),
                );
            }
            OutcomeState::Acknowledge => {
                self.queue
                    .delete_message(&metadata.queue_url, &metadata.receipt_handle)
                    .await
                    .map_err(|e| Self::terminal_action_failed("acknowledge", &metadata, e))?;
                log_queue_operation(
                    "acknowledge",
                    &metadata.queue_url,
                    Some(metadata.message_id.as_str()),
                    "deleted",
                    None,
                );
            }
            OutcomeState::Decide => {
                return Err(WorkflowError::internal("Decision did not reach a terminal state"));
            }
        }

        Ok(OutcomeReport {
            message_id: metadata.message_id,
            queue_url: metadata.queue_url,
            terminal_state: target,
        })
    }

    fn terminal_action_failed(
        action: &str,
        metadata: &QueueCoordinates,
        error: MessagingError,
    ) -> WorkflowError {
        if error.is_stale_lease() {
            warn!(
                action,
                message_id = %metadata.message_id,
                error = %error,
                "Lease already released or superseded by a redelivery"
            );
        }
        WorkflowError::from(error)
    }

    /// Definition document for a hosted engine, with this machine's settings
    pub fn definition_document(&self) -> Value {
        render_definition(self.rearm_visibility, self.timeout)
    }
}

#[async_trait]
impl WorkflowDefinition for OutcomeStateMachine {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, input: Value) -> Result<Value, WorkflowError> {
        let report = self.execute(&input).await?;
        Ok(serde_json::to_value(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ExecutionRequest;
    use serde_json::json;

    const QUEUE: &str = "source-queue";

    async fn leased_message(provider: &QueueProvider) -> (MessageId, ReceiptHandle) {
        provider.ensure_queue(QUEUE).await.unwrap();
        provider.send_message(QUEUE, "{}").await.unwrap();
        let message = provider
            .receive_messages(QUEUE, 1, Duration::from_secs(300))
            .await
            .unwrap()
            .remove(0);
        (message.message_id, message.receipt_handle)
    }

    fn input(id: &MessageId, handle: &ReceiptHandle, failed: bool) -> Value {
        let data = if failed { json!({"failed": true}) } else { json!({}) };
        ExecutionRequest::new(id.clone(), QUEUE, handle.clone(), data)
            .to_input()
            .unwrap()
    }

    #[test]
    fn test_decide_on_presence() {
        assert_eq!(
            OutcomeStateMachine::decide(&json!({"metadata": {"failed": true}})),
            OutcomeState::Rearm
        );
        assert_eq!(
            OutcomeStateMachine::decide(&json!({"metadata": {"failed": null}})),
            OutcomeState::Rearm
        );
        assert_eq!(
            OutcomeStateMachine::decide(&json!({"metadata": {}, "data": {"failed": true}})),
            OutcomeState::Acknowledge
        );
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        for state in [OutcomeState::Rearm, OutcomeState::Acknowledge] {
            assert!(OutcomeStateMachine::determine_target_state(
                state,
                OutcomeEvent::FailureAbsent
            )
            .is_err());
        }
    }

    #[tokio::test]
    async fn test_acknowledge_deletes_message() {
        let (provider, service) = QueueProvider::in_memory();
        let (id, handle) = leased_message(&provider).await;
        let machine = OutcomeStateMachine::new(provider);

        let report = machine.execute(&input(&id, &handle, false)).await.unwrap();

        assert_eq!(report.terminal_state, OutcomeState::Acknowledge);
        assert_eq!(report.message_id, id);
        assert_eq!(service.queue_length(QUEUE).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_sets_short_visibility() {
        let (provider, service) = QueueProvider::in_memory();
        let (id, handle) = leased_message(&provider).await;
        let machine = OutcomeStateMachine::new(provider);

        let report = machine.execute(&input(&id, &handle, true)).await.unwrap();
        assert_eq!(report.terminal_state, OutcomeState::Rearm);

        let snapshot = service.snapshot(QUEUE).await.remove(0);
        assert_eq!(snapshot.invisible_for, Some(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(service.snapshot(QUEUE).await[0].is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_boolean_failure_flag_rearms() {
        let (provider, service) = QueueProvider::in_memory();
        let (id, handle) = leased_message(&provider).await;
        let machine = OutcomeStateMachine::new(provider);

        let mut doc = input(&id, &handle, false);
        doc["metadata"]["failed"] = json!("yes");
        assert_eq!(OutcomeStateMachine::decide(&doc), OutcomeState::Rearm);

        let report = machine.execute(&doc).await.unwrap();
        assert_eq!(report.terminal_state, OutcomeState::Rearm);
        let snapshot = service.snapshot(QUEUE).await.remove(0);
        assert_eq!(snapshot.invisible_for, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_stale_handle_fails_execution() {
        let (provider, _service) = QueueProvider::in_memory();
        let (id, _handle) = leased_message(&provider).await;
        let machine = OutcomeStateMachine::new(provider);

        let err = machine
            .execute(&input(&id, &ReceiptHandle::from("999-1"), true))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Queue(_)));
    }

    #[tokio::test]
    async fn test_input_without_metadata_is_invalid() {
        let (provider, _service) = QueueProvider::in_memory();
        let machine = OutcomeStateMachine::new(provider);

        let err = machine.execute(&json!({"data": {}})).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput { .. }));
    }

    #[test]
    fn test_definition_document_uses_settings() {
        let (provider, _service) = QueueProvider::in_memory();
        let machine = OutcomeStateMachine::new(provider)
            .with_rearm_visibility(Duration::from_secs(7))
            .with_timeout(Duration::from_secs(60));

        let doc = machine.definition_document();
        assert_eq!(doc["TimeoutSeconds"], 60);
        assert_eq!(doc["States"]["RearmMessage"]["Parameters"]["VisibilityTimeout"], 7);
    }
}
