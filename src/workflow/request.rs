//! # Execution Request
//!
//! The input document handed from the ingestion phase to the decision phase.
//! This is the only contract between the two: the ingestion processor
//! produces it, the outcome state machine reads it back.
//!
//! ```text
//! { "metadata": {"message_id": str, "sqs_queue_url": str,
//!                "sqs_receipt_handle": str, "failed"?: true},
//!   "data": <JSON from the message body> }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messaging::{MessageId, ReceiptHandle};

/// Queue coordinates of the message an execution is responsible for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub message_id: MessageId,

    #[serde(rename = "sqs_queue_url")]
    pub queue_url: String,

    #[serde(rename = "sqs_receipt_handle")]
    pub receipt_handle: ReceiptHandle,

    /// Present (and `true`) only when the payload asked for a simulated failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
}

/// Execution input document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub metadata: ExecutionMetadata,
    pub data: Value,
}

impl ExecutionRequest {
    /// Build the request for one message. `metadata.failed` is set only when
    /// `data.failed` is truthy.
    pub fn new(
        message_id: MessageId,
        queue_url: impl Into<String>,
        receipt_handle: ReceiptHandle,
        data: Value,
    ) -> Self {
        let failed = data.get("failed").is_some_and(is_truthy).then_some(true);

        Self {
            metadata: ExecutionMetadata {
                message_id,
                queue_url: queue_url.into(),
                receipt_handle,
                failed,
            },
            data,
        }
    }

    /// Whether the payload requested the failure path
    pub fn simulates_failure(&self) -> bool {
        self.metadata.failed.is_some()
    }

    /// Render as the engine's input document
    pub fn to_input(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parse an engine input document
    pub fn from_input(input: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(input)
    }
}

/// Loose truthiness for payload flags: `false`, `null`, `0`, `""`, `[]` and `{}` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn request(data: Value) -> ExecutionRequest {
        ExecutionRequest::new(
            MessageId::from("m-1"),
            "source-queue",
            ReceiptHandle::from("1-1"),
            data,
        )
    }

    #[test]
    fn test_wire_format_without_failure() {
        let input = request(json!({"order": 1})).to_input().unwrap();
        assert_eq!(
            input,
            json!({
                "metadata": {
                    "message_id": "m-1",
                    "sqs_queue_url": "source-queue",
                    "sqs_receipt_handle": "1-1"
                },
                "data": {"order": 1}
            })
        );
        assert!(input["metadata"].get("failed").is_none());
    }

    #[test]
    fn test_wire_format_with_failure() {
        let input = request(json!({"failed": true})).to_input().unwrap();
        assert_eq!(input["metadata"]["failed"], json!(true));
        assert_eq!(input["data"], json!({"failed": true}));
    }

    #[test]
    fn test_falsy_failure_flags_are_omitted() {
        for data in [
            json!({"failed": false}),
            json!({"failed": null}),
            json!({"failed": 0}),
            json!({"failed": ""}),
            json!({"failed": []}),
            json!({}),
            json!([1, 2]),
            json!("failed"),
        ] {
            assert!(!request(data.clone()).simulates_failure(), "{data}");
        }
    }

    #[test]
    fn test_truthy_failure_flags() {
        for data in [
            json!({"failed": true}),
            json!({"failed": 1}),
            json!({"failed": "yes"}),
            json!({"failed": {"reason": "x"}}),
        ] {
            assert!(request(data.clone()).simulates_failure(), "{data}");
        }
    }

    #[test]
    fn test_from_input_roundtrips_metadata() {
        let original = request(json!({"failed": true, "n": 2}));
        let parsed = ExecutionRequest::from_input(&original.to_input().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_from_input_rejects_missing_metadata() {
        assert!(ExecutionRequest::from_input(&json!({"data": {}})).is_err());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            ".{0,4}".prop_map(Value::String),
            prop::collection::vec(any::<i64>(), 0..3).prop_map(|v| json!(v)),
        ]
    }

    proptest! {
        #[test]
        fn failed_metadata_present_iff_payload_flag_truthy(flag in arb_json(), include in any::<bool>()) {
            let data = if include { json!({"failed": flag.clone(), "other": 1}) } else { json!({"other": 1}) };
            let input = request(data).to_input().unwrap();
            let present = input["metadata"].get("failed").is_some();
            prop_assert_eq!(present, include && is_truthy(&flag));
        }
    }
}
