use serde::{Deserialize, Serialize};

use crate::messaging::MessageId;

/// Partial batch response returned to the queue
///
/// Every id listed here is left for the queue to redeliver on its own
/// schedule; ids not listed are considered acknowledged by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    #[serde(rename = "batchItemFailures")]
    failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: MessageId,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id, ignoring duplicates
    pub fn record_failure(&mut self, message_id: MessageId) {
        if !self.contains(&message_id) {
            self.failures.push(BatchItemFailure {
                item_identifier: message_id,
            });
        }
    }

    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.failures
            .iter()
            .any(|f| &f.item_identifier == message_id)
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &MessageId> {
        self.failures.iter().map(|f| &f.item_identifier)
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_partial_batch_response() {
        let mut report = BatchReport::new();
        report.record_failure(MessageId::from("a"));
        report.record_failure(MessageId::from("b"));
        report.record_failure(MessageId::from("a"));

        assert_eq!(report.len(), 2);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"batchItemFailures": [{"itemIdentifier": "a"}, {"itemIdentifier": "b"}]})
        );
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::new();
        assert!(report.is_empty());
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"batchItemFailures": []})
        );
    }
}
