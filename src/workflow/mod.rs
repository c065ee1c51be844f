//! # Workflow Module
//!
//! Asynchronous workflow executions started by the ingestion processor.
//!
//! `WorkflowEngine` is the seam the processor starts executions through;
//! `WorkflowDefinition` is what an engine runs. `LocalWorkflowEngine` runs
//! each execution on its own tokio task with a hard timeout.

mod errors;
mod local;
pub mod request;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use errors::WorkflowError;
pub use local::LocalWorkflowEngine;
pub use request::{ExecutionMetadata, ExecutionRequest};
pub use types::{ExecutionId, ExecutionRecord, ExecutionStatus};

/// Starts executions of registered workflow definitions
///
/// `start_execution` returns as soon as the execution is accepted. The caller
/// never observes the execution's outcome.
#[async_trait]
pub trait WorkflowEngine: Send + Sync + 'static {
    async fn start_execution(
        &self,
        definition: &str,
        input: Value,
    ) -> Result<ExecutionId, WorkflowError>;
}

/// A runnable workflow
#[async_trait]
pub trait WorkflowDefinition: Send + Sync + 'static {
    /// Locator the definition is registered under
    fn name(&self) -> &str;

    /// Wall-clock limit for one execution
    fn timeout(&self) -> Duration;

    /// Run one execution to completion, returning its output document
    async fn run(&self, input: Value) -> Result<Value, WorkflowError>;
}
