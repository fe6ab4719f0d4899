use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single state transition recorded by the Event Log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        step_id: Option<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            step_id,
            payload,
        }
    }
}

/// The recognized event types (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    StateZero,
    StepStart,
    StepSuccess,
    StepFailure,
    StepSkipped,
    LoopIteration,
    WorkflowComplete,
    WorkflowAborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&EventType::StepSuccess).unwrap();
        assert_eq!(json, "\"STEP_SUCCESS\"");
    }
}
