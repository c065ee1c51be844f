//! Renders the outcome state machine as an Amazon States Language document,
//! for deployments that run the decision phase on a hosted engine.

use std::time::Duration;

use serde_json::{json, Map, Value};

use super::states::OutcomeState;

const INPUT_FAILED_PATH: &str = "$$.Execution.Input.metadata.failed";
const INPUT_QUEUE_URL_PATH: &str = "$$.Execution.Input.metadata.sqs_queue_url";
const INPUT_RECEIPT_HANDLE_PATH: &str = "$$.Execution.Input.metadata.sqs_receipt_handle";

const CHANGE_VISIBILITY_RESOURCE: &str = "arn:aws:states:::aws-sdk:sqs:changeMessageVisibility";
const DELETE_MESSAGE_RESOURCE: &str = "arn:aws:states:::aws-sdk:sqs:deleteMessage";

/// Build the definition document for the given rearm delay and execution timeout
pub fn render_definition(rearm_visibility: Duration, timeout: Duration) -> Value {
    let message_parameters = || {
        json!({
            "QueueUrl.$": INPUT_QUEUE_URL_PATH,
            "ReceiptHandle.$": INPUT_RECEIPT_HANDLE_PATH,
        })
    };

    let mut rearm_parameters = message_parameters();
    rearm_parameters["VisibilityTimeout"] = json!(rearm_visibility.as_secs());

    let mut states = Map::new();
    states.insert(
        OutcomeState::Decide.state_name().to_string(),
        json!({
            "Type": "Choice",
            "Choices": [{
                "Variable": INPUT_FAILED_PATH,
                "IsPresent": true,
                "Next": OutcomeState::Rearm.state_name(),
            }],
            "Default": OutcomeState::Acknowledge.state_name(),
        }),
    );
    states.insert(
        OutcomeState::Rearm.state_name().to_string(),
        json!({
            "Type": "Task",
            "Resource": CHANGE_VISIBILITY_RESOURCE,
            "Parameters": rearm_parameters,
            "End": true,
        }),
    );
    states.insert(
        OutcomeState::Acknowledge.state_name().to_string(),
        json!({
            "Type": "Task",
            "Resource": DELETE_MESSAGE_RESOURCE,
            "Parameters": message_parameters(),
            "End": true,
        }),
    );

    json!({
        "Comment": "Rearm or acknowledge the queue message an execution was started for",
        "StartAt": OutcomeState::Decide.state_name(),
        "TimeoutSeconds": timeout.as_secs(),
        "States": states,
    })
}
