use thiserror::Error;

use crate::messaging::MessagingError;

/// Errors raised while starting or running workflow executions
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow definition not found: {definition}")]
    DefinitionNotFound { definition: String },

    #[error("Workflow definition already registered: {definition}")]
    DefinitionAlreadyRegistered { definition: String },

    #[error("Invalid execution input: {message}")]
    InvalidInput { message: String },

    #[error("Execution {execution_id} timed out after {timeout_seconds}s")]
    TimedOut {
        execution_id: String,
        timeout_seconds: u64,
    },

    #[error("Queue operation failed during execution: {0}")]
    Queue(#[from] MessagingError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal workflow error: {message}")]
    Internal { message: String },
}

impl WorkflowError {
    pub fn definition_not_found(definition: impl Into<String>) -> Self {
        Self::DefinitionNotFound {
            definition: definition.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
