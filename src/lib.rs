#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, PGMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Queue Bridge
//!
//! Bridges an at-least-once message queue to an asynchronous workflow engine.
//! Each inbound message becomes an independently tracked workflow execution,
//! and the execution, not the consumer, decides whether the message is
//! deleted or made visible again for redelivery.
//!
//! ## Protocol
//!
//! 1. **Ingestion**: the batch processor extends each message's lease past the
//!    execution timeout, starts one execution per message, and reports every
//!    id back to the queue as a batch item failure. Nothing is acknowledged.
//! 2. **Decision**: each execution checks whether `metadata.failed` is present
//!    in its input. If so the message is rearmed with a short visibility
//!    timeout; otherwise it is deleted. Messages rearmed past the queue's
//!    maximum receive count are routed to the dead-letter queue.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Queue providers (in-memory, PGMQ) with leases and redrive
//! - [`workflow`] - Workflow engine seam and the local engine
//! - [`state_machine`] - Outcome state machine and its definition document
//! - [`ingestion`] - Batch ingestion processor, lease extender, execution initializer
//! - [`delivery`] - Queue polling loop with partial batch responses
//! - [`config`] - Layered configuration
//! - [`bootstrap`] - Wiring and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_queue_bridge::bootstrap::BridgeSystem;
//! use tasker_queue_bridge::config::BridgeConfig;
//! use tasker_queue_bridge::messaging::QueueProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (queue, _service) = QueueProvider::in_memory();
//! let bridge = BridgeSystem::bootstrap(BridgeConfig::default(), queue).await?;
//!
//! let handle = bridge.start();
//! // ... messages flow ...
//! let stats = handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod messaging;
pub mod state_machine;
pub mod workflow;

pub use bootstrap::{BridgeHandle, BridgeStatus, BridgeSystem};
pub use config::{BridgeConfig, ConfigLoader, ConfigurationError};
pub use error::{BridgeError, Result};
pub use ingestion::{BatchIngestionProcessor, BatchReport, QueueEvent, RecordOutcome};
pub use messaging::{QueueProvider, QueueService};
pub use state_machine::{OutcomeState, OutcomeStateMachine};
pub use workflow::{ExecutionRequest, LocalWorkflowEngine, WorkflowDefinition, WorkflowEngine};
