use std::sync::Arc;

use tracing::{debug, instrument};

use super::errors::RecordError;
use crate::workflow::{ExecutionId, ExecutionRequest, WorkflowEngine, WorkflowError};

/// Starts one workflow execution per ingested message
#[derive(Clone)]
pub struct ExecutionInitializer {
    engine: Arc<dyn WorkflowEngine>,
    definition: String,
}

impl std::fmt::Debug for ExecutionInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionInitializer")
            .field("definition", &self.definition)
            .finish()
    }
}

impl ExecutionInitializer {
    pub fn new(engine: Arc<dyn WorkflowEngine>, definition: impl Into<String>) -> Self {
        Self {
            engine,
            definition: definition.into(),
        }
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Submit the request; returns once the engine has accepted the execution
    #[instrument(skip_all, fields(message_id = %request.metadata.message_id, definition = %self.definition))]
    pub async fn start(&self, request: &ExecutionRequest) -> Result<ExecutionId, RecordError> {
        let message_id = &request.metadata.message_id;
        let input = request
            .to_input()
            .map_err(|e| RecordError::ExecutionStart {
                message_id: message_id.clone(),
                source: WorkflowError::from(e),
            })?;

        let execution_id = self
            .engine
            .start_execution(&self.definition, input)
            .await
            .map_err(|source| RecordError::ExecutionStart {
                message_id: message_id.clone(),
                source,
            })?;

        debug!(execution_id = %execution_id, "Execution started");
        Ok(execution_id)
    }
}
