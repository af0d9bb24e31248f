use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cards::CardDocument;

/// Key every payload must carry to select a handler.
pub const ACTION_KEY: &str = "action";

/// Flat key/value payload produced when a user triggers a card control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionPayload(Map<String, Value>);

impl ActionPayload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn for_action(action: impl Into<String>) -> Self {
        Self::new().with(ACTION_KEY, action.into())
    }

    /// Accepts a JSON object; anything else is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The trimmed discriminator, if present and non-blank.
    pub fn action(&self) -> Option<&str> {
        self.0
            .get(ACTION_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|action| !action.is_empty())
    }

    /// Field as text. Numbers and booleans are stringified; `null`, blank
    /// strings, arrays and objects count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }

    /// All fields except the discriminator, in payload order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(key, _)| key.as_str() != ACTION_KEY)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ActionPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Renders a payload value the way it should read inside a prompt.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A todo record minted by the `addTodo` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// The dispatcher's answer to one payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_item: Option<TodoItem>,
}

impl ActionResult {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.execute_prompt = Some(prompt.into());
        self
    }

    pub fn with_card(mut self, card: Option<CardDocument>) -> Self {
        self.card = card;
        self
    }

    /// The follow-up prompt, ignoring blank values.
    pub fn follow_up_prompt(&self) -> Option<&str> {
        self.execute_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_requires_non_blank_string() {
        assert_eq!(ActionPayload::for_action("getStarted").action(), Some("getStarted"));
        assert_eq!(ActionPayload::for_action("   ").action(), None);
        assert_eq!(ActionPayload::new().with(ACTION_KEY, 7).action(), None);
        assert_eq!(ActionPayload::new().action(), None);
    }

    #[test]
    fn text_stringifies_primitives() {
        let payload = ActionPayload::for_action("x")
            .with("rating", 5)
            .with("flag", true)
            .with("blank", "  ")
            .with("none", Value::Null)
            .with("list", json!(["a"]));
        assert_eq!(payload.text("rating").as_deref(), Some("5"));
        assert_eq!(payload.text("flag").as_deref(), Some("true"));
        assert_eq!(payload.text("blank"), None);
        assert_eq!(payload.text("none"), None);
        assert_eq!(payload.text("list"), None);
        assert_eq!(payload.text("missing"), None);
    }

    #[test]
    fn fields_skip_discriminator_and_keep_order() {
        let payload = ActionPayload::new()
            .with("q2", "b")
            .with(ACTION_KEY, "submitQuiz")
            .with("q1", "a");
        let keys: Vec<&str> = payload.fields().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["q2", "q1"]);
    }

    #[test]
    fn result_serializes_camel_case_and_omits_absent_fields() {
        let result = ActionResult::message("ok").with_prompt("next");
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value, json!({"message": "ok", "executePrompt": "next"}));

        let parsed: ActionResult =
            serde_json::from_value(json!({"message": "hi", "todoItem": {"id": "1", "text": "t", "completed": false}}))
                .expect("deserialize");
        assert_eq!(parsed.todo_item.map(|item| item.text), Some("t".to_string()));
    }

    #[test]
    fn blank_follow_up_prompt_is_ignored() {
        assert_eq!(ActionResult::message("x").with_prompt("  ").follow_up_prompt(), None);
        assert_eq!(ActionResult::message("x").with_prompt("go").follow_up_prompt(), Some("go"));
    }
}
