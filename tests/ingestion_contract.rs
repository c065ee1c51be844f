//! Contract between the ingestion phase, the queue and the decision phase.

mod common;

use proptest::prelude::*;
use serde_json::json;

use tasker_queue_bridge::ingestion::{BatchReport, QueueEvent, RecordError, RecordOutcome};
use tasker_queue_bridge::messaging::MessageId;
use tasker_queue_bridge::state_machine::{OutcomeState, OutcomeStateMachine};
use tasker_queue_bridge::workflow::ExecutionRequest;

use common::harness;

#[tokio::test]
async fn execution_input_matches_wire_format() {
    let h = harness().await;
    let event = h.deliver(&[r#"{"failed": true, "order": 9}"#]).await;
    let record = &event.records[0];

    h.bridge.handle(&event).await;
    h.bridge.engine.wait_for_all().await;

    let input = &h.bridge.engine.list_executions()[0].input;
    assert_eq!(
        input,
        &json!({
            "metadata": {
                "message_id": record.message_id.as_ref().unwrap().as_str(),
                "sqs_queue_url": "source-queue",
                "sqs_receipt_handle": record.receipt_handle.as_ref().unwrap().as_str(),
                "failed": true
            },
            "data": {"failed": true, "order": 9}
        })
    );
}

#[tokio::test]
async fn report_serializes_as_partial_batch_response() {
    let h = harness().await;
    let event = h.deliver(&["{}", "{}"]).await;

    let outcome = h.bridge.handle(&event).await;
    let ids: Vec<String> = event
        .records
        .iter()
        .map(|r| r.message_id.as_ref().unwrap().to_string())
        .collect();

    assert_eq!(
        serde_json::to_value(&outcome.report).unwrap(),
        json!({"batchItemFailures": [
            {"itemIdentifier": ids[0]},
            {"itemIdentifier": ids[1]}
        ]})
    );
    h.bridge.engine.wait_for_all().await;
}

#[tokio::test]
async fn unparseable_body_is_reported_without_execution() {
    let h = harness().await;
    let event = h.deliver(&["{not json"]).await;

    let outcome = h.bridge.handle(&event).await;

    assert!(matches!(
        &outcome.records[0],
        RecordOutcome::Failed {
            error: RecordError::MalformedPayload { .. },
            ..
        }
    ));
    assert_eq!(outcome.report.len(), 1);
    assert!(h.bridge.engine.list_executions().is_empty());
}

#[tokio::test]
async fn unknown_lease_is_reported_without_execution() {
    let h = harness().await;
    let event: QueueEvent = serde_json::from_value(json!({
        "Records": [{"messageId": "404", "receiptHandle": "404-1", "body": "{}"}]
    }))
    .unwrap();

    let outcome = h.bridge.handle(&event).await;

    assert!(matches!(
        &outcome.records[0],
        RecordOutcome::Failed {
            error: RecordError::LeaseExtension { .. },
            ..
        }
    ));
    assert!(outcome.report.contains(&MessageId::from("404")));
    assert!(h.bridge.engine.list_executions().is_empty());
}

fn payload_strategy() -> impl Strategy<Value = serde_json::Value> {
    let flag = prop_oneof![
        Just(json!(true)),
        Just(json!(false)),
        Just(json!(null)),
        Just(json!(0)),
        Just(json!(1)),
        Just(json!("")),
        Just(json!("yes")),
        Just(json!([])),
        Just(json!({"nested": true})),
    ];
    (prop::option::of(flag), any::<u32>()).prop_map(|(flag, order)| match flag {
        Some(flag) => json!({"failed": flag, "order": order}),
        None => json!({"order": order}),
    })
}

proptest! {
    /// Property: the decision branch follows the payload's failure flag exactly
    #[test]
    fn decision_follows_payload_flag(payload in payload_strategy()) {
        let request = ExecutionRequest::new(
            MessageId::from("1"),
            "source-queue",
            "1-1".into(),
            payload.clone(),
        );
        let input = request.to_input().unwrap();
        let expected = if request.simulates_failure() {
            OutcomeState::Rearm
        } else {
            OutcomeState::Acknowledge
        };
        prop_assert_eq!(OutcomeStateMachine::decide(&input), expected);
        prop_assert_eq!(&input["data"], &payload);
    }

    /// Property: the report names each id once, in first-seen order
    #[test]
    fn report_deduplicates_ids(ids in prop::collection::vec(0u8..8, 0..20)) {
        let mut report = BatchReport::new();
        for id in &ids {
            report.record_failure(MessageId::from(id.to_string()));
        }

        let mut expected: Vec<String> = Vec::new();
        for id in &ids {
            if !expected.contains(&id.to_string()) {
                expected.push(id.to_string());
            }
        }
        let actual: Vec<String> = report.failed_ids().map(|id| id.to_string()).collect();
        prop_assert_eq!(actual, expected);
    }
}
