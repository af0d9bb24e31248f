//! Session-scoped relay from rendered cards back to their conversation.
//!
//! A card lives in the rendering context; the conversation that produced it
//! may live elsewhere. Action results that ask for a follow-up prompt travel
//! over this bus, and only ever reach the session that subscribed under the
//! same [`SessionId`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::actions::ActionResult;

/// Wire tag of a relayed card action result.
pub const CARD_ACTION_EVENT_TYPE: &str = "adaptive-card-action";

/// In-process key for one chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardActionEvent {
    pub session_id: SessionId,
    pub result: ActionResult,
}

/// Serialized form: `{"type": "adaptive-card-action", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BusEnvelope {
    #[serde(rename = "adaptive-card-action")]
    CardAction(ActionResult),
}

impl From<&CardActionEvent> for BusEnvelope {
    fn from(event: &CardActionEvent) -> Self {
        BusEnvelope::CardAction(event.result.clone())
    }
}

#[derive(Clone, Default)]
pub struct ActionEventBus {
    sessions: Arc<Mutex<HashMap<SessionId, mpsc::UnboundedSender<CardActionEvent>>>>,
}

impl ActionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session_id`, replacing any previous subscription.
    pub fn subscribe(&self, session_id: SessionId) -> mpsc::UnboundedReceiver<CardActionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id, tx);
        }
        rx
    }

    pub fn unsubscribe(&self, session_id: SessionId) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&session_id);
        }
    }

    /// Relays `result` to its owning session. Results without a follow-up
    /// prompt stay local to the card. Returns whether anything was delivered.
    pub fn publish(&self, session_id: SessionId, result: ActionResult) -> bool {
        if result.follow_up_prompt().is_none() {
            return false;
        }

        let Ok(mut sessions) = self.sessions.lock() else {
            return false;
        };
        let Some(tx) = sessions.get(&session_id) else {
            debug!(%session_id, "no subscriber for card action event");
            return false;
        };

        let event = CardActionEvent { session_id, result };
        if tx.send(event).is_err() {
            debug!(%session_id, "subscriber went away, dropping session");
            sessions.remove(&session_id);
            return false;
        }
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prompt_result(prompt: &str) -> ActionResult {
        ActionResult::message("Executing your prompt...").with_prompt(prompt)
    }

    #[test]
    fn delivers_only_to_owning_session() {
        let bus = ActionEventBus::new();
        let mine = SessionId::new();
        let other = SessionId::new();
        let mut my_rx = bus.subscribe(mine);
        let mut other_rx = bus.subscribe(other);

        assert!(bus.publish(mine, prompt_result("hello")));

        let event = my_rx.try_recv().expect("delivered");
        assert_eq!(event.session_id, mine);
        assert_eq!(event.result.follow_up_prompt(), Some("hello"));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn results_without_prompt_stay_local() {
        let bus = ActionEventBus::new();
        let session = SessionId::new();
        let mut rx = bus.subscribe(session);
        assert!(!bus.publish(session, ActionResult::message("Added todo: x")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_or_closed_sessions_are_not_delivered() {
        let bus = ActionEventBus::new();
        assert!(!bus.publish(SessionId::new(), prompt_result("x")));

        let session = SessionId::new();
        drop(bus.subscribe(session));
        assert_eq!(bus.subscriber_count(), 1);
        assert!(!bus.publish(session, prompt_result("x")));
        assert_eq!(bus.subscriber_count(), 0);

        let session = SessionId::new();
        let _rx = bus.subscribe(session);
        bus.unsubscribe(session);
        assert!(!bus.publish(session, prompt_result("x")));
    }

    #[test]
    fn session_ids_are_distinct_uuids() {
        let first = SessionId::new();
        let second = SessionId::default();
        assert_ne!(first, second);
        let parsed = Uuid::parse_str(&first.to_string()).expect("uuid text");
        assert_eq!(SessionId(parsed), first);
    }

    #[test]
    fn envelope_uses_broadcast_wire_shape() {
        let event = CardActionEvent {
            session_id: SessionId::new(),
            result: prompt_result("go"),
        };
        let value = serde_json::to_value(BusEnvelope::from(&event)).expect("serialize");
        assert_eq!(
            value,
            json!({
                "type": CARD_ACTION_EVENT_TYPE,
                "data": {"message": "Executing your prompt...", "executePrompt": "go"}
            })
        );
        let parsed: BusEnvelope = serde_json::from_value(value).expect("deserialize");
        assert_eq!(parsed, BusEnvelope::CardAction(prompt_result("go")));
    }
}
