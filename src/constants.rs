//! # Bridge Constants
//!
//! Operational defaults of the redelivery protocol. Every value here can be
//! overridden through `BridgeConfig`.

/// Lease placed on each message at ingestion, seconds. Must exceed
/// `DEFAULT_EXECUTION_TIMEOUT_SECONDS` so the decision phase runs while the
/// message is still invisible.
pub const DEFAULT_LEASE_EXTENSION_SECONDS: u64 = 300;

/// Visibility applied by the rearm branch, seconds
pub const DEFAULT_REARM_VISIBILITY_SECONDS: u64 = 5;

/// Hard limit on one outcome execution, seconds
pub const DEFAULT_EXECUTION_TIMEOUT_SECONDS: u64 = 120;

/// Receives allowed before a message is routed to the dead-letter queue
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 1;

/// Messages per delivered batch
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Visibility the consumer receives messages with before the lease extension
pub const DEFAULT_RECEIVE_VISIBILITY_SECONDS: u64 = 30;

/// Idle delay between empty polls, milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Finished executions the local engine keeps queryable
pub const DEFAULT_EXECUTION_HISTORY: usize = 1000;

pub mod queues {
    pub const SOURCE_QUEUE: &str = "source-queue";
    pub const DEAD_LETTER_QUEUE: &str = "dlq-for-source-queue";
}

pub mod workflows {
    /// Locator the outcome state machine is registered under
    pub const OUTCOME_STATE_MACHINE: &str = "outcome-state-machine";
}
