//! # Messaging Error Types
//!
//! Structured errors for queue providers using thiserror instead of
//! `Box<dyn Error>` patterns.

use thiserror::Error;

/// Errors raised by queue providers
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Database query error: {operation}: {message}")]
    DatabaseQuery { operation: String, message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Message {message_id} is not in flight: {reason}")]
    MessageNotInFlight { message_id: String, reason: String },

    #[error("Invalid receipt handle: {handle}")]
    InvalidReceiptHandle { handle: String },

    #[error("Invalid visibility timeout: {seconds}s exceeds maximum of {max_seconds}s")]
    InvalidVisibilityTimeout { seconds: u64, max_seconds: u64 },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a database connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::DatabaseConnection {
            message: message.into(),
        }
    }

    /// Create a database query error
    pub fn database_query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DatabaseQuery {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create a message not found error
    pub fn message_not_found(message_id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            message_id: message_id.into(),
        }
    }

    /// Create an error for a lease operation on a message that is not currently leased
    pub fn not_in_flight(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MessageNotInFlight {
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid receipt handle error
    pub fn invalid_receipt_handle(handle: impl Into<String>) -> Self {
        Self::InvalidReceiptHandle {
            handle: handle.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an extend visibility error
    pub fn extend_visibility(
        queue_name: impl Into<String>,
        handle: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: format!("extend_visibility({handle})"),
            message: message.into(),
        }
    }

    /// Create a delete error
    pub fn delete(
        queue_name: impl Into<String>,
        handle: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: format!("delete({handle})"),
            message: message.into(),
        }
    }

    /// Whether the error came from a lease that has already been released or superseded
    pub fn is_stale_lease(&self) -> bool {
        matches!(
            self,
            Self::MessageNotInFlight { .. } | Self::MessageNotFound { .. }
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for MessagingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::connection(err.to_string())
            }
            other => Self::database_query("sql", other.to_string()),
        }
    }
}
