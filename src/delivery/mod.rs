//! Delivery of queue batches to the ingestion processor.

mod consumer;

pub use consumer::{ConsumerStats, QueueConsumer};
