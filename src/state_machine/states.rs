use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the outcome state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeState {
    /// Initial choice on `metadata.failed`
    #[default]
    Decide,
    /// Message made visible again after a short delay
    Rearm,
    /// Message deleted from the queue
    Acknowledge,
}

impl OutcomeState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rearm | Self::Acknowledge)
    }

    /// State name used in the rendered definition document
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Decide => "DecideOutcome",
            Self::Rearm => "RearmMessage",
            Self::Acknowledge => "AcknowledgeMessage",
        }
    }
}

impl fmt::Display for OutcomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decide => write!(f, "decide"),
            Self::Rearm => write!(f, "rearm"),
            Self::Acknowledge => write!(f, "acknowledge"),
        }
    }
}

impl std::str::FromStr for OutcomeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decide" => Ok(Self::Decide),
            "rearm" => Ok(Self::Rearm),
            "acknowledge" => Ok(Self::Acknowledge),
            _ => Err(format!("Invalid outcome state: {s}")),
        }
    }
}
