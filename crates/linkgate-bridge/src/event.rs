//! Hook inputs and outputs.
//!
//! Field names follow the host-facing JSON contract (`callbackUrl`,
//! `callbackId`, `eventId`, ...).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque checkpoint owned by the caller and threaded between polls.
///
/// The bridge never merges states: whatever a poll returns as its next
/// state replaces the previous one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollState(pub Map<String, Value>);

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` on the very first poll of a callback identity.
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Set `key`, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for PollState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Input to `install`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallContext {
    /// Where the provider should deliver pushes.
    pub callback_url: String,
    pub callback_id: String,
}

/// Input to `handle`: one inbound push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub callback_id: String,
    /// Caller-supplied; the bridge does not deduplicate on it.
    pub event_id: String,
    pub payload: Value,
}

/// Actionable result produced from an inbound push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandledEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub result: Map<String, Value>,
}

impl HandledEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            result: Map::new(),
        }
    }

    /// Add a field to the result map.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }
}

/// Input to `poll`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub callback_id: String,
    /// The last committed state, or the default on the first poll.
    pub state: PollState,
}

/// Result of one poll: the new items and the checkpoint to resume from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub items: Vec<Map<String, Value>>,
    /// `None` leaves the committed state unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_state: Option<PollState>,
}

impl PollOutcome {
    /// No new items and no state change.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(items: Vec<Map<String, Value>>, next_state: PollState) -> Self {
        Self {
            items,
            next_state: Some(next_state),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handled_event_uses_type_field() {
        let event = HandledEvent::new("issue_opened").with("number", 7);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "issue_opened", "result": {"number": 7}})
        );
    }

    #[test]
    fn inbound_event_uses_host_field_names() {
        let event: InboundEvent = serde_json::from_value(json!({
            "callbackId": "cb-1",
            "eventId": "evt-1",
            "payload": {"action": "opened"}
        }))
        .unwrap();
        assert_eq!(event.callback_id, "cb-1");
        assert_eq!(event.payload["action"], "opened");
    }

    #[test]
    fn poll_state_is_a_plain_object_on_the_wire() {
        let state = PollState::new().with("since", "2024-01-01T00:00:00Z");
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"since": "2024-01-01T00:00:00Z"})
        );
        assert_eq!(state.get_str("since"), Some("2024-01-01T00:00:00Z"));
        assert!(!state.is_initial());
        assert!(PollState::default().is_initial());
    }

    #[test]
    fn empty_outcome_keeps_state() {
        let outcome = PollOutcome::empty();
        assert!(outcome.items.is_empty());
        assert!(outcome.next_state.is_none());
    }
}
