use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::workflow::WorkflowError;

/// Top-level error for bridge setup and operation
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
