//! # Messaging Module
//!
//! Provider-agnostic queue access for the bridge. Supports PGMQ and in-memory
//! backends through the `QueueProvider` enum.
//!
//! ## Module Structure
//!
//! - `traits` - The `QueueService` contract every provider implements
//! - `provider` - Enum dispatch over the concrete providers
//! - `providers` - In-memory and PGMQ implementations
//! - `types` - Message ids, receipt handles, redrive policies, statistics
//! - `errors` - Messaging error types

pub mod errors;
mod provider;
pub mod providers;
mod traits;
pub mod types;

pub use errors::MessagingError;
pub use provider::QueueProvider;
pub use providers::{InMemoryQueueService, MessageSnapshot};
#[cfg(feature = "postgres")]
pub use providers::PgmqQueueService;
pub use traits::QueueService;
pub use types::{MessageId, QueueStats, ReceiptHandle, ReceivedMessage, RedrivePolicy};

/// Result type for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
