//! # PGMQ Queue Service
//!
//! PostgreSQL Message Queue implementation over the `pgmq` SQL functions.
//!
//! ## Features
//!
//! - **Visibility Timeout**: Native `pgmq.read` / `pgmq.set_vt` lease semantics
//! - **Atomic Redrive**: Dead-lettering sends to the DLQ and deletes from the
//!   source inside one transaction
//! - **Runtime Queries**: Plain `sqlx::query` so no database is needed at build time
//!
//! PGMQ leases are keyed by `msg_id`, so the receipt handle is the message id
//! rendered as a string. PGMQ has no native redrive; the policy registered with
//! [`PgmqQueueService::set_redrive_policy`] is applied on every read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, error, info, instrument, warn};

use crate::messaging::traits::QueueService;
use crate::messaging::types::{
    MessageId, QueueStats, ReceiptHandle, ReceivedMessage, RedrivePolicy,
};
use crate::messaging::MessagingError;

const BODY_FIELD: &str = "body";

/// PGMQ-based queue service
///
/// # Example
///
/// ```ignore
/// use tasker_queue_bridge::messaging::{PgmqQueueService, QueueService, RedrivePolicy};
///
/// let service = PgmqQueueService::new("postgresql://localhost/bridge").await?;
/// service.ensure_queue("source_queue").await?;
/// service.set_redrive_policy("source_queue", RedrivePolicy::new("source_queue_dlq", 1)).await?;
/// let msg_id = service.send_message("source_queue", r#"{"order": 1}"#).await?;
/// ```
#[derive(Debug, Clone)]
pub struct PgmqQueueService {
    pool: PgPool,
    redrive_policies: std::sync::Arc<DashMap<String, RedrivePolicy>>,
    dead_lettered: std::sync::Arc<DashMap<String, u64>>,
}

impl PgmqQueueService {
    /// Create a new PGMQ queue service from a database URL
    pub async fn new(database_url: &str) -> Result<Self, MessagingError> {
        info!("Connecting to pgmq");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .map_err(|e| MessagingError::connection(e.to_string()))?;

        info!("Connected to pgmq");
        Ok(Self::new_with_pool(pool))
    }

    /// Create a new PGMQ queue service with an existing connection pool
    pub fn new_with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            redrive_policies: Default::default(),
            dead_lettered: Default::default(),
        }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach a redrive policy to a source queue, creating the dead-letter queue
    pub async fn set_redrive_policy(
        &self,
        queue_name: &str,
        policy: RedrivePolicy,
    ) -> Result<(), MessagingError> {
        if policy.max_receive_count == 0 {
            return Err(MessagingError::queue_operation(
                queue_name,
                "set_redrive_policy",
                "max_receive_count must be at least 1",
            ));
        }
        self.ensure_queue(&policy.dead_letter_queue).await?;
        self.redrive_policies.insert(queue_name.to_string(), policy);
        Ok(())
    }

    /// PGMQ queue names become table names, so only `[a-z0-9_]` survive
    fn pgmq_name(queue_name: &str) -> String {
        queue_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect()
    }

    /// Bodies are stored as jsonb `{"body": "<raw text>"}` so the exact text
    /// survives, whether or not it is valid JSON
    fn encode_body(body: &str) -> Value {
        let mut fields = Map::new();
        fields.insert(BODY_FIELD.to_string(), Value::String(body.to_string()));
        Value::Object(fields)
    }

    /// Messages written by other producers carry arbitrary jsonb and are
    /// rendered as JSON text
    fn decode_body(message: Value) -> String {
        if let Value::Object(fields) = &message {
            if let (1, Some(Value::String(raw))) = (fields.len(), fields.get(BODY_FIELD)) {
                return raw.clone();
            }
        }
        message.to_string()
    }

    fn handle_to_msg_id(receipt_handle: &ReceiptHandle) -> Result<i64, MessagingError> {
        receipt_handle
            .as_i64()
            .ok_or_else(|| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))
    }

    fn seconds(queue_name: &str, duration: Duration) -> Result<i32, MessagingError> {
        i32::try_from(duration.as_secs()).map_err(|_| {
            MessagingError::queue_operation(
                queue_name,
                "visibility",
                format!("{}s does not fit a pgmq visibility timeout", duration.as_secs()),
            )
        })
    }

    #[instrument(skip(self, message), fields(queue = %queue_name, dead_letter_queue = %policy.dead_letter_queue))]
    async fn dead_letter(
        &self,
        queue_name: &str,
        policy: &RedrivePolicy,
        msg_id: i64,
        message: &Value,
    ) -> Result<(), MessagingError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pgmq.send($1, $2)")
            .bind(Self::pgmq_name(&policy.dead_letter_queue))
            .bind(message)
            .execute(&mut *tx)
            .await?;
        sqlx::query("SELECT pgmq.delete($1, $2)")
            .bind(Self::pgmq_name(queue_name))
            .bind(msg_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        *self
            .dead_lettered
            .entry(queue_name.to_string())
            .or_insert(0) += 1;

        warn!(
            message_id = msg_id,
            max_receive_count = policy.max_receive_count,
            "Max receive count exhausted, moved message to dead-letter queue"
        );
        Ok(())
    }
}

#[async_trait]
impl QueueService for PgmqQueueService {
    #[instrument(skip(self), fields(queue = %queue_name))]
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(Self::pgmq_name(queue_name))
            .execute(&self.pool)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "create", e.to_string()))?;

        debug!("Queue ensured");
        Ok(())
    }

    #[instrument(skip(self, body), fields(queue = %queue_name))]
    async fn send_message(
        &self,
        queue_name: &str,
        body: &str,
    ) -> Result<MessageId, MessagingError> {
        let msg_id: i64 = sqlx::query_scalar("SELECT * FROM pgmq.send($1, $2)")
            .bind(Self::pgmq_name(queue_name))
            .bind(Self::encode_body(body))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "send", e.to_string()))?;

        debug!(message_id = msg_id, "Message sent");
        Ok(MessageId::from(msg_id))
    }

    #[instrument(skip(self), fields(queue = %queue_name, max_messages = max_messages))]
    async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, MessagingError> {
        let vt = Self::seconds(queue_name, visibility_timeout)?;
        let qty = i32::try_from(max_messages).unwrap_or(i32::MAX);

        let rows = sqlx::query(
            "SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read($1, $2, $3)",
        )
        .bind(Self::pgmq_name(queue_name))
        .bind(vt)
        .bind(qty)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessagingError::queue_operation(queue_name, "read", e.to_string()))?;

        let policy = self
            .redrive_policies
            .get(queue_name)
            .map(|entry| entry.value().clone());

        let mut received = Vec::with_capacity(rows.len());
        for row in rows {
            let msg_id: i64 = row.try_get("msg_id")?;
            let read_ct: i32 = row.try_get("read_ct")?;
            let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at")?;
            let message: Value = row.try_get("message")?;

            // read_ct already counts this read, so the previous count decides exhaustion
            let previous_reads = u32::try_from(read_ct.saturating_sub(1)).unwrap_or(0);
            if let Some(policy) = policy.as_ref().filter(|p| p.exhausted(previous_reads)) {
                self.dead_letter(queue_name, policy, msg_id, &message).await?;
                continue;
            }

            received.push(ReceivedMessage {
                message_id: MessageId::from(msg_id),
                receipt_handle: ReceiptHandle::from(msg_id),
                body: Self::decode_body(message),
                receive_count: u32::try_from(read_ct).unwrap_or(0),
                enqueued_at,
            });
        }

        debug!(count = received.len(), "Received messages");
        Ok(received)
    }

    #[instrument(skip(self), fields(queue = %queue_name, receipt_handle = %receipt_handle))]
    async fn extend_visibility(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), MessagingError> {
        let msg_id = Self::handle_to_msg_id(receipt_handle)?;
        let vt = Self::seconds(queue_name, timeout)?;

        let updated = sqlx::query("SELECT msg_id FROM pgmq.set_vt($1, $2, $3)")
            .bind(Self::pgmq_name(queue_name))
            .bind(msg_id)
            .bind(vt)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MessagingError::extend_visibility(queue_name, msg_id, e.to_string()))?;

        match updated {
            Some(_) => Ok(()),
            None => Err(MessagingError::message_not_found(msg_id.to_string())),
        }
    }

    #[instrument(skip(self), fields(queue = %queue_name, receipt_handle = %receipt_handle))]
    async fn delete_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        let msg_id = Self::handle_to_msg_id(receipt_handle)?;

        let deleted: bool = sqlx::query_scalar("SELECT pgmq.delete($1, $2)")
            .bind(Self::pgmq_name(queue_name))
            .bind(msg_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MessagingError::delete(queue_name, msg_id, e.to_string()))?;

        if deleted {
            Ok(())
        } else {
            Err(MessagingError::message_not_found(msg_id.to_string()))
        }
    }

    #[instrument(skip(self), fields(queue = %queue_name))]
    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let row = sqlx::query(
            "SELECT queue_length, oldest_msg_age_sec, total_messages FROM pgmq.metrics($1)",
        )
        .bind(Self::pgmq_name(queue_name))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessagingError::queue_operation(queue_name, "metrics", e.to_string()))?;

        let row = row.ok_or_else(|| MessagingError::queue_not_found(queue_name))?;
        let queue_length: i64 = row.try_get("queue_length")?;
        let oldest_age: Option<i32> = row.try_get("oldest_msg_age_sec")?;
        let total_messages: i64 = row.try_get("total_messages")?;

        let dead_lettered = self
            .dead_lettered
            .get(queue_name)
            .map(|count| *count)
            .unwrap_or(0);

        let mut stats = QueueStats::new(queue_name, u64::try_from(queue_length).unwrap_or(0))
            .with_dead_lettered(dead_lettered);
        stats.total_sent = u64::try_from(total_messages).unwrap_or(0);
        if let Some(age) = oldest_age {
            stats = stats.with_oldest_message_age(Duration::from_secs(
                u64::try_from(age).unwrap_or(0),
            ));
        }
        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                error!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "pgmq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_survives_storage() {
        for body in [r#"{"order": 1}"#, r#""hello""#, "not json", "42", "", "null"] {
            let stored = PgmqQueueService::encode_body(body);
            assert_eq!(stored, serde_json::json!({"body": body}));
            assert_eq!(PgmqQueueService::decode_body(stored), body);
        }
    }

    #[test]
    fn test_foreign_messages_decode_as_json_text() {
        assert_eq!(
            PgmqQueueService::decode_body(serde_json::json!({"order": 1})),
            r#"{"order":1}"#
        );
        assert_eq!(
            PgmqQueueService::decode_body(serde_json::json!({"body": 7})),
            r#"{"body":7}"#
        );
        assert_eq!(
            PgmqQueueService::decode_body(Value::String("hello".to_string())),
            r#""hello""#
        );
    }

    #[test]
    fn test_queue_names_are_table_safe() {
        assert_eq!(PgmqQueueService::pgmq_name("source-queue"), "source_queue");
        assert_eq!(
            PgmqQueueService::pgmq_name("dlq-for-Source-Queue"),
            "dlq_for_source_queue"
        );
    }

    #[test]
    fn test_receipt_handle_must_be_numeric() {
        assert_eq!(
            PgmqQueueService::handle_to_msg_id(&ReceiptHandle::from("42")).unwrap(),
            42
        );
        assert!(PgmqQueueService::handle_to_msg_id(&ReceiptHandle::from("42-1")).is_err());
    }

    #[test]
    fn test_visibility_seconds_conversion() {
        assert_eq!(
            PgmqQueueService::seconds("q", Duration::from_secs(300)).unwrap(),
            300
        );
        assert!(PgmqQueueService::seconds("q", Duration::from_secs(u64::MAX)).is_err());
    }

    /// Requires a PostgreSQL database with the pgmq extension installed
    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a pgmq-enabled database"]
    async fn test_pgmq_lease_roundtrip() {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let service = PgmqQueueService::new(&database_url).await.unwrap();
        let queue = format!("bridge_test_{}", uuid::Uuid::new_v4().simple());
        service.ensure_queue(&queue).await.unwrap();

        service.send_message(&queue, r#"{"order": 1}"#).await.unwrap();
        let received = service
            .receive_messages(&queue, 1, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, r#"{"order": 1}"#);

        service
            .extend_visibility(&queue, &received[0].receipt_handle, Duration::from_secs(300))
            .await
            .unwrap();
        service
            .delete_message(&queue, &received[0].receipt_handle)
            .await
            .unwrap();
        assert!(service
            .delete_message(&queue, &received[0].receipt_handle)
            .await
            .is_err());
    }
}
