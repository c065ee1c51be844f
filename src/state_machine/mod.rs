// Outcome state machine for the decision phase
//
// Decide -> Rearm | Acknowledge, evaluated once per execution on the presence
// of `metadata.failed` in the execution input.

pub mod definition;
pub mod events;
pub mod outcome;
pub mod states;

pub use definition::render_definition;
pub use events::OutcomeEvent;
pub use outcome::{OutcomeReport, OutcomeStateMachine};
pub use states::OutcomeState;
