//! Delivery event shape handed to the processor, following the queue's
//! batch delivery format: `{"Records": [{"messageId", "receiptHandle", "body"}]}`.

use serde::{Deserialize, Serialize};

use crate::messaging::{MessageId, ReceiptHandle, ReceivedMessage};

/// One delivered batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<DeliveredRecord>,
}

impl QueueEvent {
    pub fn new(records: Vec<DeliveredRecord>) -> Self {
        Self { records }
    }

    pub fn from_messages(messages: &[ReceivedMessage]) -> Self {
        Self::new(messages.iter().map(DeliveredRecord::from).collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A record as delivered. Every field is optional on the wire so a
/// malformed record can still be deserialized and reported on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<ReceiptHandle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl DeliveredRecord {
    pub fn new(
        message_id: impl Into<MessageId>,
        receipt_handle: impl Into<ReceiptHandle>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Some(message_id.into()),
            receipt_handle: Some(receipt_handle.into()),
            body: Some(body.into()),
        }
    }
}

impl From<&ReceivedMessage> for DeliveredRecord {
    fn from(message: &ReceivedMessage) -> Self {
        Self {
            message_id: Some(message.message_id.clone()),
            receipt_handle: Some(message.receipt_handle.clone()),
            body: Some(message.body.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_delivery_event() {
        let event: QueueEvent = serde_json::from_value(json!({
            "Records": [
                {
                    "messageId": "059f36b4",
                    "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
                    "body": "{\"order\": 1}",
                    "attributes": {"ApproximateReceiveCount": "1"},
                    "eventSource": "aws:sqs"
                },
                {"receiptHandle": "h-2"}
            ]
        }))
        .unwrap();

        assert_eq!(event.len(), 2);
        assert_eq!(event.records[0].message_id, Some(MessageId::from("059f36b4")));
        assert_eq!(event.records[0].body.as_deref(), Some("{\"order\": 1}"));
        assert!(event.records[1].message_id.is_none());
        assert!(event.records[1].body.is_none());
    }

    #[test]
    fn test_missing_records_is_empty_batch() {
        let event: QueueEvent = serde_json::from_value(json!({})).unwrap();
        assert!(event.is_empty());
    }
}
