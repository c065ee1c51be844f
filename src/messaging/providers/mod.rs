//! # Queue Providers
//!
//! Concrete implementations of the `QueueService` trait.
//!
//! - [`InMemoryQueueService`] - Thread-safe in-memory queues for local runs and tests
//! - [`PgmqQueueService`] - PostgreSQL Message Queue via `sqlx`

mod in_memory;
#[cfg(feature = "postgres")]
mod pgmq;

pub use in_memory::{InMemoryQueueService, MessageSnapshot, MAX_VISIBILITY_TIMEOUT};
#[cfg(feature = "postgres")]
pub use pgmq::PgmqQueueService;
