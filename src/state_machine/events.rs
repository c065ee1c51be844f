use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that drive the outcome state machine out of `Decide`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutcomeEvent {
    /// `metadata.failed` is present in the execution input
    FailureFlagged,
    /// `metadata.failed` is absent
    FailureAbsent,
}

impl OutcomeEvent {
    /// Derive the event from an execution input document.
    ///
    /// Only presence is tested; the flag's value is never read.
    pub fn from_input(input: &Value) -> Self {
        let flagged = input
            .get("metadata")
            .and_then(|metadata| metadata.get("failed"))
            .is_some();

        if flagged {
            Self::FailureFlagged
        } else {
            Self::FailureAbsent
        }
    }

    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FailureFlagged => "failure_flagged",
            Self::FailureAbsent => "failure_absent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presence_not_value_decides() {
        for failed in [json!(true), json!(false), json!(null), json!("no")] {
            let input = json!({"metadata": {"failed": failed}, "data": {}});
            assert_eq!(OutcomeEvent::from_input(&input), OutcomeEvent::FailureFlagged);
        }
    }

    #[test]
    fn test_absent_flag() {
        let input = json!({"metadata": {"message_id": "1"}, "data": {"failed": true}});
        assert_eq!(OutcomeEvent::from_input(&input), OutcomeEvent::FailureAbsent);
        assert_eq!(OutcomeEvent::from_input(&json!({})), OutcomeEvent::FailureAbsent);
        assert_eq!(OutcomeEvent::from_input(&json!(null)), OutcomeEvent::FailureAbsent);
    }
}
