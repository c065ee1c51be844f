//! # Ingestion Module
//!
//! Phase one of the redelivery protocol: lease extension, execution start,
//! and the partial batch response.

mod errors;
mod initializer;
mod lease;
mod processor;
mod record;
mod report;

pub use errors::RecordError;
pub use initializer::ExecutionInitializer;
pub use lease::LeaseExtender;
pub use processor::{BatchIngestionProcessor, BatchOutcome, RecordOutcome};
pub use record::{DeliveredRecord, QueueEvent};
pub use report::{BatchItemFailure, BatchReport};
