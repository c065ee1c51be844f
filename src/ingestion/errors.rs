use thiserror::Error;

use crate::messaging::{MessageId, MessagingError};
use crate::workflow::WorkflowError;

/// Why a single delivered record could not be handed to the workflow engine
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record {index} is missing required field '{field}'")]
    MalformedRecord { index: usize, field: &'static str },

    #[error("Message {message_id} body is not valid JSON: {source}")]
    MalformedPayload {
        message_id: MessageId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to extend lease for message {message_id}: {source}")]
    LeaseExtension {
        message_id: MessageId,
        #[source]
        source: MessagingError,
    },

    #[error("Failed to start execution for message {message_id}: {source}")]
    ExecutionStart {
        message_id: MessageId,
        #[source]
        source: WorkflowError,
    },
}

impl RecordError {
    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "malformed_record",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::LeaseExtension { .. } => "lease_extension",
            Self::ExecutionStart { .. } => "execution_start",
        }
    }
}
